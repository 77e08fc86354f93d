//! The remote store contract.

use crate::SyncResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque version token of the remote file (a content hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRef(String);

impl RemoteRef {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A remote versioned file holding a copy of the document.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Human readable location, used in logs and errors.
    fn location(&self) -> String;

    /// Fetch the current version token without the content.
    ///
    /// Returns `None` if the remote file does not exist yet.
    async fn fetch_ref(&self) -> SyncResult<Option<RemoteRef>>;

    /// Replace the remote content if its token still equals `expected`.
    ///
    /// `expected = None` creates the file. Fails with
    /// [`SyncError::Conflict`](crate::SyncError::Conflict) when the token is stale.
    async fn write(
        &self,
        content: &str,
        expected: Option<&RemoteRef>,
        message: &str,
    ) -> SyncResult<RemoteRef>;
}
