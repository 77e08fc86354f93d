//! Snapshot error types.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot not found, or the name is not a well-formed snapshot name.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// A stored document could not be parsed.
    #[error("Snapshot corrupted: {id}: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a corrupt snapshot error.
    pub fn corrupt(id: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            id: id.into(),
            source,
        }
    }

    /// Whether this error means the snapshot does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_name() {
        let err = SnapshotError::not_found("markers-backup-20250101120000.json");
        assert_eq!(
            err.to_string(),
            "Snapshot not found: markers-backup-20250101120000.json"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn corrupt_keeps_parse_error_as_source() {
        let json_err = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = SnapshotError::corrupt("markers-backup-x", json_err);
        assert!(err.to_string().starts_with("Snapshot corrupted: markers-backup-x"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_not_found());
    }

    #[test]
    fn io_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SnapshotError::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }
}
