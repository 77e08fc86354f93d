//! Error types for the core crate.

use markerd_snapshot::SnapshotError;
use markerd_sync::SyncError;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Local store error. Local persistence failures are never swallowed.
    #[error(transparent)]
    Store(#[from] SnapshotError),

    /// Remote setup error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Unknown or malformed snapshot id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(SnapshotError::NotFound(_)))
    }

    /// A stored document failed to parse.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Store(SnapshotError::Corrupt { .. }))
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
