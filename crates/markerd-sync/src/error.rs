//! Sync error types.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while talking to the remote store.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote file changed since its token was last fetched.
    #[error("Remote version conflict on {0}")]
    Conflict(String),

    /// The remote was unreachable or rejected the request.
    #[error("Remote sync failed: {message}")]
    Failed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl SyncError {
    /// Create a conflict error for a remote path.
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict(path.into())
    }

    /// Create a failure without an underlying cause.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a failure wrapping its cause.
    pub fn failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        Self::failed_with(message, err)
    }
}
