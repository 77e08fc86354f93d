//! Token-tracking client over a [`RemoteStore`].

use crate::{RemoteRef, RemoteStore, SyncResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// What the client believes about the remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    /// Nothing observed yet, or the last observation went stale.
    Unknown,
    /// The remote file does not exist.
    Absent,
    /// The remote file was last seen at this token.
    At(RemoteRef),
}

impl Observed {
    fn from_fetch(token: Option<&RemoteRef>) -> Self {
        match token {
            Some(token) => Self::At(token.clone()),
            None => Self::Absent,
        }
    }
}

/// Pushes documents to a remote store with conditional writes.
///
/// The client remembers the token returned by the last fetch or write and
/// supplies it on the next push. A conflict or failure forgets it, so the
/// next push starts from a fresh fetch. Retrying is left to the caller.
pub struct SyncClient {
    remote: Arc<dyn RemoteStore>,
    observed: Mutex<Observed>,
}

impl SyncClient {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            observed: Mutex::new(Observed::Unknown),
        }
    }

    /// Location of the remote file.
    pub fn location(&self) -> String {
        self.remote.location()
    }

    /// Fetch and remember the current remote token.
    pub async fn fetch(&self) -> SyncResult<Option<RemoteRef>> {
        let mut observed = self.observed.lock().await;
        *observed = Observed::Unknown;
        let token = self.remote.fetch_ref().await?;
        *observed = Observed::from_fetch(token.as_ref());
        Ok(token)
    }

    /// Push `content` conditionally on the last observed token.
    ///
    /// Fetches first when no token is known. Pushing the same content twice
    /// is safe.
    pub async fn push(&self, content: &str, message: &str) -> SyncResult<RemoteRef> {
        let mut observed = self.observed.lock().await;
        if *observed == Observed::Unknown {
            let token = self.remote.fetch_ref().await?;
            *observed = Observed::from_fetch(token.as_ref());
        }

        let expected = match &*observed {
            Observed::At(token) => Some(token.clone()),
            _ => None,
        };

        match self.remote.write(content, expected.as_ref(), message).await {
            Ok(token) => {
                info!("Synced {} at {}", self.remote.location(), token);
                *observed = Observed::At(token.clone());
                Ok(token)
            }
            Err(e) => {
                debug!("Push to {} failed: {}", self.remote.location(), e);
                *observed = Observed::Unknown;
                Err(e)
            }
        }
    }
}
