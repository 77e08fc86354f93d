//! Snapshot identities and listing entries.

use crate::{Document, SnapshotError, SnapshotResult};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::OnceLock;

/// File name prefix shared by every snapshot.
pub const SNAPSHOT_PREFIX: &str = "markers-backup-";

/// File extension shared by every snapshot.
pub const SNAPSHOT_EXTENSION: &str = ".json";

/// Highest sequence number within one millisecond.
const MAX_SEQ: u32 = 999;

static NAME_REGEX: OnceLock<Regex> = OnceLock::new();

/// Matches `markers-backup-<14 digit seconds>[<3 digit millis>-<3 digit seq>].json`.
///
/// The short form is what older deployments wrote.
fn name_regex() -> &'static Regex {
    NAME_REGEX.get_or_init(|| {
        Regex::new(r"^markers-backup-(\d{14})(?:(\d{3})-(\d{3}))?\.json$")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Name of a snapshot file.
///
/// Names sort lexicographically in creation order. Only names accepted by
/// [`SnapshotId::parse`] are ever joined onto the backup directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId {
    name: String,
    created_at: DateTime<Utc>,
    seq: Option<u32>,
}

impl SnapshotId {
    /// Validate a snapshot name.
    ///
    /// Anything that is not a well-formed snapshot name, including names
    /// carrying path separators, is reported as not found.
    pub fn parse(name: &str) -> SnapshotResult<Self> {
        let not_found = || SnapshotError::not_found(name);
        let caps = name_regex().captures(name).ok_or_else(not_found)?;

        let seconds = caps.get(1).map(|m| m.as_str()).ok_or_else(not_found)?;
        let mut created_at = NaiveDateTime::parse_from_str(seconds, "%Y%m%d%H%M%S")
            .map_err(|_| not_found())?
            .and_utc();

        let mut seq = None;
        if let (Some(millis), Some(n)) = (caps.get(2), caps.get(3)) {
            let millis: i64 = millis.as_str().parse().map_err(|_| not_found())?;
            created_at += Duration::milliseconds(millis);
            seq = Some(n.as_str().parse().map_err(|_| not_found())?);
        }

        Ok(Self {
            name: name.to_string(),
            created_at,
            seq,
        })
    }

    /// Name for a snapshot taken at `now`, strictly after `latest`.
    ///
    /// Reuses the latest stamp with the next sequence number when `now` does
    /// not move past it (same millisecond, or the clock stepped back).
    pub fn next(now: DateTime<Utc>, latest: Option<&SnapshotId>) -> Self {
        let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);

        let (stamp, seq) = match latest {
            Some(latest) if now <= latest.created_at => match latest.seq {
                Some(seq) if seq >= MAX_SEQ => (latest.created_at + Duration::milliseconds(1), 0),
                Some(seq) => (latest.created_at, seq + 1),
                None => (latest.created_at, 0),
            },
            _ => (now, 0),
        };

        Self::at(stamp, seq)
    }

    fn at(stamp: DateTime<Utc>, seq: u32) -> Self {
        let name = format!(
            "{}{}-{:03}{}",
            SNAPSHOT_PREFIX,
            stamp.format("%Y%m%d%H%M%S%3f"),
            seq,
            SNAPSHOT_EXTENSION
        );
        Self {
            name,
            created_at: stamp,
            seq: Some(seq),
        }
    }

    /// Get the file name.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// When the snapshot was taken, as encoded in its name.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Ord for SnapshotId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl PartialOrd for SnapshotId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = SnapshotError;

    fn try_from(name: String) -> SnapshotResult<Self> {
        Self::parse(&name)
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.name
    }
}

/// A snapshot as seen by a listing.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub id: SnapshotId,

    /// Number of records, zero when the snapshot failed to parse.
    pub record_count: usize,

    /// Whether the file failed to parse as a document.
    pub corrupt: bool,

    /// Parsed content; empty when corrupt.
    pub document: Document,
}

impl SnapshotEntry {
    pub(crate) fn parsed(id: SnapshotId, document: Document) -> Self {
        Self {
            id,
            record_count: document.len(),
            corrupt: false,
            document,
        }
    }

    pub(crate) fn corrupt(id: SnapshotId) -> Self {
        Self {
            id,
            record_count: 0,
            corrupt: true,
            document: Document::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn test_parse_current_format() {
        let id = SnapshotId::parse("markers-backup-20250314093015123-002.json").unwrap();
        assert_eq!(id.created_at(), at(2025, 3, 14, 9, 30, 15, 123));
        assert_eq!(id.seq, Some(2));
    }

    #[test]
    fn test_parse_legacy_format() {
        let id = SnapshotId::parse("markers-backup-20250314093015.json").unwrap();
        assert_eq!(id.created_at(), at(2025, 3, 14, 9, 30, 15, 0));
        assert_eq!(id.seq, None);
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for name in [
            "",
            "markers.json",
            "../markers.json",
            "markers-backup-../../etc/passwd.json",
            "markers-backup-2025.json",
            "markers-backup-20251399999999.json",
            "markers-backup-20250314093015.json.tmp",
            "sub/markers-backup-20250314093015.json",
            ".markers-backup-20250314093015123-000.json",
        ] {
            let err = SnapshotId::parse(name).unwrap_err();
            assert!(err.is_not_found(), "{name} should be rejected");
        }
    }

    #[test]
    fn test_next_formats_millisecond_stamp() {
        let id = SnapshotId::next(at(2025, 3, 14, 9, 30, 15, 123), None);
        assert_eq!(id.as_str(), "markers-backup-20250314093015123-000.json");
        assert_eq!(SnapshotId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_next_same_millisecond_bumps_sequence() {
        let now = at(2025, 3, 14, 9, 30, 15, 123);
        let first = SnapshotId::next(now, None);
        let second = SnapshotId::next(now, Some(&first));
        let third = SnapshotId::next(now, Some(&second));
        assert_eq!(second.as_str(), "markers-backup-20250314093015123-001.json");
        assert!(first < second && second < third);
    }

    #[test]
    fn test_next_clock_step_back_stays_monotonic() {
        let latest = SnapshotId::next(at(2025, 3, 14, 9, 30, 15, 500), None);
        let next = SnapshotId::next(at(2025, 3, 14, 9, 0, 0, 0), Some(&latest));
        assert!(next > latest);
    }

    #[test]
    fn test_next_sequence_overflow_moves_to_next_millisecond() {
        let latest = SnapshotId::parse("markers-backup-20250314093015123-999.json").unwrap();
        let next = SnapshotId::next(at(2025, 3, 14, 9, 30, 15, 123), Some(&latest));
        assert_eq!(next.as_str(), "markers-backup-20250314093015124-000.json");
        assert!(next > latest);
    }

    #[test]
    fn test_legacy_sorts_before_new_names_in_same_second() {
        let legacy = SnapshotId::parse("markers-backup-20250314093015.json").unwrap();
        let next = SnapshotId::next(at(2025, 3, 14, 9, 30, 15, 0), Some(&legacy));
        assert_eq!(next.as_str(), "markers-backup-20250314093015000-000.json");
        assert!(legacy < next);
    }

    #[test]
    fn test_serde_round_trips_as_plain_string() {
        let id = SnapshotId::parse("markers-backup-20250314093015.json").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"markers-backup-20250314093015.json\"");
        assert!(serde_json::from_str::<SnapshotId>("\"../x.json\"").is_err());
    }
}
