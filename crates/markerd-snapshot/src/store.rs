//! Snapshot storage implementation.

use crate::{Document, SnapshotEntry, SnapshotError, SnapshotId, SnapshotResult};
use chrono::Utc;
use fs2::FileExt;
use markerd_util::TimingGuard;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Storage for the current document and its backups.
///
/// ```text
/// data/markers.json                 # current document
/// markers-backups/
///   markers-backup-<stamp>.json     # one file per previous state
/// ```
///
/// Every write goes to a dot-prefixed temporary sibling and is renamed into
/// place, so readers never see a truncated file. Writers, in this process
/// or another, must hold [`SnapshotStore::lock_writer`] around
/// [`SnapshotStore::save`]; reads need no coordination.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    /// Path of the current document.
    current_path: PathBuf,

    /// Directory holding snapshot files.
    backup_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store handle. Nothing is touched on disk until the first save.
    pub fn new(current_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_path: current_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Take the exclusive writer lock, waiting for other writers.
    ///
    /// The lock is an advisory lock on `.lock` in the backup directory, so
    /// it also excludes writers in other processes. Released on drop.
    pub async fn lock_writer(&self) -> SnapshotResult<WriterLock> {
        fs::create_dir_all(&self.backup_dir).await?;
        let path = self.backup_dir.join(LOCK_FILE);

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Acquired writer lock in {}", self.backup_dir.display());
        Ok(WriterLock { _file: file })
    }

    /// Whether a current document exists.
    pub async fn has_current(&self) -> SnapshotResult<bool> {
        Ok(fs::try_exists(&self.current_path).await?)
    }

    /// Load the current document, `None` before the first save.
    pub async fn current(&self) -> SnapshotResult<Option<Document>> {
        match fs::read(&self.current_path).await {
            Ok(bytes) => Document::from_slice(&bytes)
                .map(Some)
                .map_err(|e| SnapshotError::corrupt(self.current_path.display().to_string(), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SnapshotError::Io(e)),
        }
    }

    /// Replace the current document, backing up the previous one first.
    ///
    /// Returns the snapshot holding the previous document, or `None` when
    /// there was no current document yet.
    pub async fn save(&self, document: &Document) -> SnapshotResult<Option<SnapshotId>> {
        let _timing = TimingGuard::store("save");

        fs::create_dir_all(&self.backup_dir).await?;
        if let Some(parent) = non_empty_parent(&self.current_path) {
            fs::create_dir_all(parent).await?;
        }

        let backup = self.backup_current().await?;

        let content = document.to_pretty_json()?;
        write_atomic(&self.current_path, content.as_bytes()).await?;

        info!(
            records = document.len(),
            backup = backup.as_ref().map(|id| id.as_str()),
            "Saved current document"
        );

        Ok(backup)
    }

    /// Copy the current document file byte for byte into a new snapshot.
    async fn backup_current(&self) -> SnapshotResult<Option<SnapshotId>> {
        let bytes = match fs::read(&self.current_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No current document, skipping backup");
                return Ok(None);
            }
            Err(e) => return Err(SnapshotError::Io(e)),
        };

        let latest = self.snapshot_ids().await?.pop();
        let id = SnapshotId::next(Utc::now(), latest.as_ref());
        write_atomic(&self.snapshot_path(&id), &bytes).await?;

        debug!(snapshot = %id, bytes = bytes.len(), "Created snapshot");
        Ok(Some(id))
    }

    /// List all snapshots, newest first.
    ///
    /// Snapshots that fail to parse are reported as corrupt with no records
    /// rather than failing the listing.
    pub async fn list(&self) -> SnapshotResult<Vec<SnapshotEntry>> {
        let ids = self.snapshot_ids().await?;
        let mut entries = Vec::with_capacity(ids.len());

        for id in ids.into_iter().rev() {
            match fs::read(self.snapshot_path(&id)).await {
                Ok(bytes) => match Document::from_slice(&bytes) {
                    Ok(document) => entries.push(SnapshotEntry::parsed(id, document)),
                    Err(e) => {
                        warn!("Snapshot {} is corrupted: {}", id, e);
                        entries.push(SnapshotEntry::corrupt(id));
                    }
                },
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Snapshot {} disappeared while listing", id);
                }
                Err(e) => {
                    warn!("Failed to read snapshot {}: {}", id, e);
                    entries.push(SnapshotEntry::corrupt(id));
                }
            }
        }

        Ok(entries)
    }

    /// Load one snapshot by name.
    pub async fn read(&self, name: &str) -> SnapshotResult<Document> {
        let id = SnapshotId::parse(name)?;

        let bytes = match fs::read(self.snapshot_path(&id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::not_found(id.as_str()))
            }
            Err(e) => return Err(SnapshotError::Io(e)),
        };

        Document::from_slice(&bytes).map_err(|e| SnapshotError::corrupt(id.as_str(), e))
    }

    /// All snapshot ids, oldest first. Unrelated files are ignored.
    pub async fn snapshot_ids(&self) -> SnapshotResult<Vec<SnapshotId>> {
        let mut ids = Vec::new();

        let mut entries = match fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(SnapshotError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| SnapshotId::parse(n).ok()) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Delete a snapshot.
    pub async fn delete(&self, id: &SnapshotId) -> SnapshotResult<()> {
        match fs::remove_file(self.snapshot_path(id)).await {
            Ok(()) => {
                debug!("Deleted snapshot {}", id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(SnapshotError::not_found(id.as_str())),
            Err(e) => Err(SnapshotError::Io(e)),
        }
    }

    fn snapshot_path(&self, id: &SnapshotId) -> PathBuf {
        self.backup_dir.join(id.as_str())
    }
}

/// Name of the lock file inside the backup directory.
const LOCK_FILE: &str = ".lock";

/// Exclusive right to write a [`SnapshotStore`], held until dropped.
#[derive(Debug)]
pub struct WriterLock {
    _file: std::fs::File,
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Write to a temporary sibling, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = path.with_file_name(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    fs::write(&temp_path, bytes).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    Ok(())
}
