//! Bounded retention of snapshots.

use crate::{SnapshotId, SnapshotStore};
use tracing::{debug, info, warn};

/// Number of snapshots kept unless configured otherwise.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 100;

/// Keeps at most `max_snapshots` snapshots, evicting the oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    max_snapshots: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SNAPSHOTS)
    }
}

impl RetentionPolicy {
    pub fn new(max_snapshots: usize) -> Self {
        Self { max_snapshots }
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    /// Snapshots to evict from `ids` (sorted oldest first).
    ///
    /// `reserve` leaves room for snapshots about to be created, so that the
    /// count stays within the bound once they exist.
    pub fn excess<'a>(&self, ids: &'a [SnapshotId], reserve: usize) -> &'a [SnapshotId] {
        let keep = self.max_snapshots.saturating_sub(reserve);
        let count = ids.len().saturating_sub(keep);
        &ids[..count]
    }

    /// Delete excess snapshots from `store`.
    ///
    /// Best-effort: failures are logged and never returned, so retention can
    /// not block a save. Returns the number of snapshots deleted.
    pub async fn enforce(&self, store: &SnapshotStore, reserve: usize) -> usize {
        let ids = match store.snapshot_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to scan snapshots for retention: {}", e);
                return 0;
            }
        };

        let excess = self.excess(&ids, reserve);
        if excess.is_empty() {
            debug!(count = ids.len(), max = self.max_snapshots, "Retention within bound");
            return 0;
        }

        let mut deleted = 0;
        for id in excess {
            match store.delete(id).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete old snapshot {}: {}", id, e),
            }
        }

        info!("Pruned {} of {} snapshots", deleted, ids.len());
        deleted
    }
}
