//! Version manager: the operations clients see.

use crate::config::Config;
use crate::error::CoreResult;
use chrono::{DateTime, Utc};
use markerd_snapshot::{
    Diff, DiffEngine, Document, RetentionPolicy, SnapshotEntry, SnapshotId, SnapshotStore,
};
use markerd_sync::{GitHubStore, RemoteRef, SyncClient};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What a successful save or restore did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Saved,
    Restored,
}

/// Result of [`VersionManager::save`] and [`VersionManager::restore`].
///
/// The local write always happened when an outcome is returned. `warning`
/// is set when mirroring to the remote failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub status: SaveStatus,

    /// Snapshot holding the document that was replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<SnapshotId>,

    /// Remote version written, when a remote is configured and the push succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// One snapshot in the history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "filename")]
    pub id: SnapshotId,

    pub created_at: DateTime<Utc>,

    #[serde(rename = "count")]
    pub record_count: usize,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub corrupt: bool,

    /// Changes relative to the previous snapshot; zeros for the oldest.
    pub diff: Diff,
}

/// Orchestrates the snapshot store, retention, diffing and the remote mirror.
///
/// Saves and restores are serialized from retention through the remote
/// push: within the process by an async mutex, and across processes sharing
/// the same files by the store's writer lock. Reads take no lock.
pub struct VersionManager {
    store: SnapshotStore,
    retention: RetentionPolicy,
    differ: DiffEngine,
    sync: Option<SyncClient>,
    conflict_retries: u32,
    write_lock: Mutex<()>,
}

impl VersionManager {
    /// A manager with default retention and diffing and no remote.
    pub fn new(store: SnapshotStore) -> Self {
        Self {
            store,
            retention: RetentionPolicy::default(),
            differ: DiffEngine::default(),
            sync: None,
            conflict_retries: 0,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_diff_engine(mut self, differ: DiffEngine) -> Self {
        self.differ = differ;
        self
    }

    /// Mirror every save to `client`, retrying conflicts up to `conflict_retries` times.
    pub fn with_sync(mut self, client: SyncClient, conflict_retries: u32) -> Self {
        self.sync = Some(client);
        self.conflict_retries = conflict_retries;
        self
    }

    /// Build a manager from configuration, resolving paths against `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path) -> CoreResult<Self> {
        let store = SnapshotStore::new(config.current_path(base_dir), config.backup_dir(base_dir));
        let mut manager = Self::new(store)
            .with_retention(RetentionPolicy::new(config.max_snapshots()))
            .with_diff_engine(DiffEngine::new(config.id_field()));

        match config.github() {
            Some(github) => {
                let remote = GitHubStore::new(github)?;
                let client = SyncClient::new(Arc::new(remote));
                info!("Mirroring to {}", client.location());
                manager = manager.with_sync(client, config.conflict_retries());
            }
            None => debug!("No remote configured, mirroring disabled"),
        }

        Ok(manager)
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// The current document, `None` before the first save.
    pub async fn current(&self) -> CoreResult<Option<Document>> {
        Ok(self.store.current().await?)
    }

    /// Replace the current document, backing up the previous one.
    pub async fn save(&self, document: Document) -> CoreResult<SaveOutcome> {
        let _guard = self.write_lock.lock().await;
        let _writer = self.store.lock_writer().await?;

        let backup = self.replace(&document).await?;
        let message = format!("Update {} from map editor", self.file_label());
        let (remote, warning) = self.mirror(&document, &message).await;

        Ok(SaveOutcome {
            status: SaveStatus::Saved,
            backup,
            remote,
            warning,
        })
    }

    /// Make snapshot `id` current again.
    ///
    /// The document current before the restore is itself backed up. An
    /// unknown or malformed id fails with `NotFound` before anything is
    /// written.
    pub async fn restore(&self, id: &str) -> CoreResult<SaveOutcome> {
        SnapshotId::parse(id)?;
        let _guard = self.write_lock.lock().await;
        let _writer = self.store.lock_writer().await?;

        let document = self.store.read(id).await?;
        let backup = self.replace(&document).await?;
        info!(snapshot = id, records = document.len(), "Restored snapshot");

        let message = format!("Restore {} from backup {}", self.file_label(), id);
        let (remote, warning) = self.mirror(&document, &message).await;

        Ok(SaveOutcome {
            status: SaveStatus::Restored,
            backup,
            remote,
            warning,
        })
    }

    /// Load one snapshot.
    pub async fn read_snapshot(&self, id: &str) -> CoreResult<Document> {
        Ok(self.store.read(id).await?)
    }

    /// Snapshot names, newest first.
    pub async fn snapshot_names(&self) -> CoreResult<Vec<String>> {
        let ids = self.store.snapshot_ids().await?;
        Ok(ids.into_iter().rev().map(String::from).collect())
    }

    /// All snapshots newest first, each diffed against its predecessor.
    pub async fn list_history(&self) -> CoreResult<Vec<HistoryEntry>> {
        let entries = self.store.list().await?;
        Ok(self.history(entries))
    }

    /// Pair newest-first entries with their diffs.
    fn history(&self, entries: Vec<SnapshotEntry>) -> Vec<HistoryEntry> {
        let diffs: Vec<Diff> = (0..entries.len())
            .map(|i| {
                let previous = entries.get(i + 1).map(|e| &e.document);
                self.differ.diff(previous, &entries[i].document)
            })
            .collect();

        entries
            .into_iter()
            .zip(diffs)
            .map(|(entry, diff)| HistoryEntry {
                created_at: entry.id.created_at(),
                id: entry.id,
                record_count: entry.record_count,
                corrupt: entry.corrupt,
                diff,
            })
            .collect()
    }

    /// Enforce retention, then write `document` with a backup.
    async fn replace(&self, document: &Document) -> CoreResult<Option<SnapshotId>> {
        let reserve = usize::from(self.store.has_current().await?);
        self.retention.enforce(&self.store, reserve).await;
        Ok(self.store.save(document).await?)
    }

    /// Push to the remote, if any. Failures become a warning.
    async fn mirror(
        &self,
        document: &Document,
        message: &str,
    ) -> (Option<RemoteRef>, Option<String>) {
        let Some(sync) = &self.sync else {
            return (None, None);
        };

        let content = match document.to_pretty_json() {
            Ok(content) => content,
            Err(e) => return (None, Some(format!("Saved locally but not synced: {}", e))),
        };

        let mut attempt = 0;
        loop {
            match sync.push(&content, message).await {
                Ok(token) => return (Some(token), None),
                Err(e) if e.is_conflict() && attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!("{}, refetching (retry {})", e, attempt);
                    if let Err(e) = sync.fetch().await {
                        return (None, Some(sync_warning(sync, &e)));
                    }
                }
                Err(e) => return (None, Some(sync_warning(sync, &e))),
            }
        }
    }

    fn file_label(&self) -> String {
        self.store
            .current_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "markers.json".to_string())
    }
}

fn sync_warning(sync: &SyncClient, err: &markerd_sync::SyncError) -> String {
    warn!("Sync to {} failed: {}", sync.location(), err);
    format!("Saved locally but sync to {} failed: {}", sync.location(), err)
}
