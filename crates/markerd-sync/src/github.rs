//! GitHub contents API as a remote store.

use crate::{RemoteRef, RemoteStore, SyncError, SyncResult};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use markerd_util::TimingGuard;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Location of the mirrored file and credentials.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    /// File path inside the repository.
    pub path: String,
    pub branch: String,
    /// Personal access token with contents write permission.
    pub token: String,
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// One file in a GitHub repository, updated through the contents API.
pub struct GitHubStore {
    client: Client,
    config: GitHubConfig,
}

impl GitHubStore {
    /// Create a new GitHub store.
    pub fn new(config: GitHubConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("markerd/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::failed_with("failed to build HTTP client", e))?;

        Ok(Self { client, config })
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            self.config.path.trim_start_matches('/')
        )
    }

    /// Calls taking more than half the timeout are reported as slow.
    fn timing(&self, action: &str) -> TimingGuard {
        let half_timeout = u64::try_from(self.config.timeout.as_millis() / 2).unwrap_or(u64::MAX);
        TimingGuard::sync(format!("{} {}", action, self.location())).with_warn_threshold(half_timeout)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

/// Metadata of a file returned by the contents API.
#[derive(Debug, Deserialize)]
struct ContentMetadata {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: ContentMetadata,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

async fn failure(action: &str, response: Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("Failed to {}: {} - {}", action, status, body);
    SyncError::failed(format!("Failed to {action}: {status}"))
}

#[async_trait]
impl RemoteStore for GitHubStore {
    fn location(&self) -> String {
        format!(
            "{}/{}:{}@{}",
            self.config.owner, self.config.repo, self.config.path, self.config.branch
        )
    }

    /// Blob sha of the file via the contents API.
    ///
    /// The response also carries the base64 file body, which is discarded.
    /// The marker file is small enough that a separate tree lookup for the
    /// sha alone would cost more than it saves.
    async fn fetch_ref(&self) -> SyncResult<Option<RemoteRef>> {
        let _timing = self.timing("fetch");

        let response = self
            .authorized(self.client.get(self.contents_url()))
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Remote file {} does not exist yet", self.location());
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(failure("fetch remote file", response).await);
        }

        let metadata: ContentMetadata = response.json().await?;
        debug!("Remote file {} is at {}", self.location(), metadata.sha);
        Ok(Some(RemoteRef::new(metadata.sha)))
    }

    async fn write(
        &self,
        content: &str,
        expected: Option<&RemoteRef>,
        message: &str,
    ) -> SyncResult<RemoteRef> {
        let _timing = self.timing("write");

        let body = WriteRequest {
            message,
            content: STANDARD.encode(content),
            branch: &self.config.branch,
            sha: expected.map(RemoteRef::as_str),
        };

        let response = self
            .authorized(self.client.put(self.contents_url()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // GitHub answers 409 for a stale sha and 422 when a sha was required
        // but not supplied.
        if status == StatusCode::CONFLICT
            || (status == StatusCode::UNPROCESSABLE_ENTITY && expected.is_none())
        {
            return Err(SyncError::conflict(self.location()));
        }
        if !status.is_success() {
            return Err(failure("update remote file", response).await);
        }

        let written: WriteResponse = response.json().await?;
        debug!("Updated {} to {}", self.location(), written.content.sha);
        Ok(RemoteRef::new(written.content.sha))
    }
}
