//! End-to-end behaviour of the version manager against a real directory
//! and an in-memory remote.

use async_trait::async_trait;
use markerd_core::{Document, Record, SaveStatus, VersionManager};
use markerd_snapshot::{RetentionPolicy, SnapshotStore};
use markerd_sync::{RemoteRef, RemoteStore, SyncClient, SyncError, SyncResult};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct RemoteState {
    version: u32,
    exists: bool,
    content: Option<String>,
    messages: Vec<String>,
    /// Errors returned by the next writes, in order.
    failures: Vec<SyncError>,
    /// Bump the version behind the client's back before the next write.
    race_next: usize,
}

#[derive(Default)]
struct FakeRemote {
    state: Mutex<RemoteState>,
}

impl FakeRemote {
    fn fail_next(&self, err: SyncError) {
        self.state.lock().unwrap().failures.push(err);
    }

    fn race(&self, times: usize) {
        self.state.lock().unwrap().race_next = times;
    }

    fn content(&self) -> Option<String> {
        self.state.lock().unwrap().content.clone()
    }

    fn messages(&self) -> Vec<String> {
        self.state.lock().unwrap().messages.clone()
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    fn location(&self) -> String {
        "fake:markers.json".to_string()
    }

    async fn fetch_ref(&self) -> SyncResult<Option<RemoteRef>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .exists
            .then(|| RemoteRef::new(format!("v{}", state.version))))
    }

    async fn write(
        &self,
        content: &str,
        expected: Option<&RemoteRef>,
        message: &str,
    ) -> SyncResult<RemoteRef> {
        let mut state = self.state.lock().unwrap();
        if !state.failures.is_empty() {
            return Err(state.failures.remove(0));
        }
        if state.race_next > 0 {
            state.race_next -= 1;
            state.version += 1;
            state.exists = true;
        }

        let current = state
            .exists
            .then(|| RemoteRef::new(format!("v{}", state.version)));
        if current.as_ref() != expected {
            return Err(SyncError::conflict("markers.json"));
        }

        state.version += 1;
        state.exists = true;
        state.content = Some(content.to_string());
        state.messages.push(message.to_string());
        Ok(RemoteRef::new(format!("v{}", state.version)))
    }
}

fn marker(id: i64, name: &str) -> Record {
    Record::new()
        .with("id", id)
        .with("lat", 52.34)
        .with("lng", 4.89)
        .with("name", name)
}

fn doc(records: Vec<Record>) -> Document {
    records.into_iter().collect()
}

fn store(dir: &TempDir) -> SnapshotStore {
    SnapshotStore::new(
        dir.path().join("data/markers.json"),
        dir.path().join("markers-backups"),
    )
}

fn manager(dir: &TempDir) -> VersionManager {
    VersionManager::new(store(dir))
}

fn synced(dir: &TempDir, remote: Arc<FakeRemote>, retries: u32) -> VersionManager {
    manager(dir).with_sync(SyncClient::new(remote), retries)
}

#[tokio::test]
async fn first_save_of_empty_document_creates_no_backup() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);

    let outcome = manager.save(Document::new()).await.unwrap();

    assert_eq!(outcome.status, SaveStatus::Saved);
    assert!(outcome.backup.is_none());
    assert!(outcome.warning.is_none());
    assert_eq!(manager.current().await.unwrap(), Some(Document::new()));
    assert!(manager.list_history().await.unwrap().is_empty());
}

#[tokio::test]
async fn current_reflects_last_save() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let document = doc(vec![marker(1, "Stand A"), marker(2, "Stand B")]);

    manager.save(doc(vec![marker(1, "Old")])).await.unwrap();
    let outcome = manager.save(document.clone()).await.unwrap();

    assert!(outcome.backup.is_some());
    assert_eq!(manager.current().await.unwrap(), Some(document));
}

#[tokio::test]
async fn retention_keeps_newest_pre_save_states() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir).with_retention(RetentionPolicy::new(3));

    for i in 0..7 {
        manager
            .save(doc(vec![marker(1, &format!("v{}", i))]))
            .await
            .unwrap();
        let count = manager.store().snapshot_ids().await.unwrap().len();
        assert!(count <= 3, "{} snapshots after save {}", count, i);
    }

    let history = manager.list_history().await.unwrap();
    let mut kept = Vec::new();
    for entry in &history {
        let document = manager.read_snapshot(entry.id.as_str()).await.unwrap();
        kept.push(document.records()[0].get("name").cloned().unwrap());
    }
    assert_eq!(kept, vec!["v5", "v4", "v3"]);
}

#[tokio::test]
async fn failed_retention_delete_does_not_block_save() {
    let dir = TempDir::new().unwrap();
    let stuck = dir
        .path()
        .join("markers-backups/markers-backup-20000101000000.json");
    std::fs::create_dir_all(&stuck).unwrap();
    let manager = manager(&dir).with_retention(RetentionPolicy::new(1));

    for i in 0..4 {
        manager
            .save(doc(vec![marker(1, &format!("v{}", i))]))
            .await
            .unwrap();
    }

    assert!(stuck.is_dir());
    let ids = manager.store().snapshot_ids().await.unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0].as_str(), "markers-backup-20000101000000.json");

    // Every other old snapshot was still pruned; only the newest survives.
    let newest = manager.read_snapshot(ids[1].as_str()).await.unwrap();
    assert_eq!(newest, doc(vec![marker(1, "v2")]));
    assert_eq!(manager.current().await.unwrap(), Some(doc(vec![marker(1, "v3")])));
}

#[tokio::test]
async fn history_diffs_against_chronological_predecessor() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);

    manager
        .save(doc(vec![marker(1, "A"), marker(2, "B")]))
        .await
        .unwrap();
    manager
        .save(doc(vec![marker(1, "A2"), marker(3, "C")]))
        .await
        .unwrap();
    manager.save(Document::new()).await.unwrap();

    let history = manager.list_history().await.unwrap();
    assert_eq!(history.len(), 2);

    let newest = &history[0];
    assert_eq!(newest.record_count, 2);
    assert_eq!(newest.diff.added, 1);
    assert_eq!(newest.diff.removed, 1);
    assert_eq!(newest.diff.changed, 1);
    assert_eq!(newest.diff.fields.get("name"), Some(&1));
    assert_eq!(newest.diff.fields.len(), 1);

    let oldest = &history[1];
    assert_eq!(oldest.record_count, 2);
    assert!(oldest.diff.is_empty());
    assert!(oldest.diff.fields.is_empty());
    assert!(history[0].id > history[1].id);
}

#[tokio::test]
async fn corrupt_snapshot_is_listed_but_not_restorable() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);

    manager.save(doc(vec![marker(1, "A")])).await.unwrap();
    manager.save(doc(vec![marker(1, "B")])).await.unwrap();
    std::fs::write(
        dir.path()
            .join("markers-backups/markers-backup-20000101000000.json"),
        "{ not json",
    )
    .unwrap();

    let history = manager.list_history().await.unwrap();
    assert_eq!(history.len(), 2);

    let corrupt = &history[1];
    assert!(corrupt.corrupt);
    assert_eq!(corrupt.record_count, 0);
    assert!(corrupt.diff.is_empty());
    // The valid snapshot is diffed against an empty document.
    assert_eq!(history[0].diff.added, 1);

    let err = manager
        .restore("markers-backup-20000101000000.json")
        .await
        .unwrap_err();
    assert!(err.is_corrupt());
    assert_eq!(manager.current().await.unwrap(), Some(doc(vec![marker(1, "B")])));
}

#[tokio::test]
async fn restore_backs_up_pre_restore_state() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let first = doc(vec![marker(1, "A")]);
    let second = doc(vec![marker(1, "A"), marker(2, "B")]);

    manager.save(first.clone()).await.unwrap();
    let outcome = manager.save(second.clone()).await.unwrap();
    let target = outcome.backup.unwrap();

    let restored = manager.restore(target.as_str()).await.unwrap();

    assert_eq!(restored.status, SaveStatus::Restored);
    assert_eq!(manager.current().await.unwrap(), Some(first));

    let history = manager.list_history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(Some(&history[0].id), restored.backup.as_ref());
    assert_eq!(
        manager.read_snapshot(history[0].id.as_str()).await.unwrap(),
        second
    );
    assert_eq!(history[0].diff.added, 1);
}

#[tokio::test]
async fn restore_unknown_id_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    manager.save(doc(vec![marker(1, "A")])).await.unwrap();
    manager.save(doc(vec![marker(1, "B")])).await.unwrap();
    let before = manager.store().snapshot_ids().await.unwrap();

    for id in [
        "markers-backup-19990101000000.json",
        "../data/markers.json",
        "markers-backup-latest.json",
        "",
    ] {
        let err = manager.restore(id).await.unwrap_err();
        assert!(err.is_not_found(), "{}: {}", id, err);
    }

    assert_eq!(manager.store().snapshot_ids().await.unwrap(), before);
    assert_eq!(manager.current().await.unwrap(), Some(doc(vec![marker(1, "B")])));
}

#[tokio::test]
async fn save_mirrors_document_to_remote() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(FakeRemote::default());
    let manager = synced(&dir, remote.clone(), 1);
    let document = doc(vec![marker(1, "A")]);

    let first = manager.save(document.clone()).await.unwrap();
    let second = manager.save(document.clone()).await.unwrap();

    assert_eq!(first.remote, Some(RemoteRef::new("v1")));
    assert_eq!(second.remote, Some(RemoteRef::new("v2")));
    assert!(second.warning.is_none());

    let local = std::fs::read_to_string(dir.path().join("data/markers.json")).unwrap();
    assert_eq!(remote.content(), Some(local));
    assert_eq!(remote.messages()[0], "Update markers.json from map editor");
}

#[tokio::test]
async fn restore_commit_names_the_backup() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(FakeRemote::default());
    let manager = synced(&dir, remote.clone(), 1);

    manager.save(doc(vec![marker(1, "A")])).await.unwrap();
    let backup = manager
        .save(doc(vec![marker(1, "B")]))
        .await
        .unwrap()
        .backup
        .unwrap();
    manager.restore(backup.as_str()).await.unwrap();

    assert_eq!(
        remote.messages().last().unwrap(),
        &format!("Restore markers.json from backup {}", backup)
    );
}

#[tokio::test]
async fn push_failure_keeps_local_write() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(FakeRemote::default());
    let manager = synced(&dir, remote.clone(), 1);

    manager.save(doc(vec![marker(1, "A")])).await.unwrap();
    remote.fail_next(SyncError::failed("request timed out"));
    let outcome = manager.save(doc(vec![marker(1, "B")])).await.unwrap();

    let warning = outcome.warning.unwrap();
    assert!(warning.contains("request timed out"), "{}", warning);
    assert!(outcome.remote.is_none());
    assert!(outcome.backup.is_some());
    assert_eq!(manager.current().await.unwrap(), Some(doc(vec![marker(1, "B")])));

    // The next save refetches and syncs again.
    let outcome = manager.save(doc(vec![marker(1, "C")])).await.unwrap();
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn conflict_is_retried_after_refetch() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(FakeRemote::default());
    let manager = synced(&dir, remote.clone(), 1);

    manager.save(doc(vec![marker(1, "A")])).await.unwrap();
    remote.race(1);
    let outcome = manager.save(doc(vec![marker(1, "B")])).await.unwrap();

    assert!(outcome.warning.is_none());
    assert!(outcome.remote.is_some());
    assert!(remote.content().unwrap().contains("\"B\""));
}

#[tokio::test]
async fn conflict_without_retries_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(FakeRemote::default());
    let manager = synced(&dir, remote.clone(), 0);

    manager.save(doc(vec![marker(1, "A")])).await.unwrap();
    remote.race(1);
    let outcome = manager.save(doc(vec![marker(1, "B")])).await.unwrap();

    let warning = outcome.warning.unwrap();
    assert!(warning.contains("conflict"), "{}", warning);
    assert_eq!(manager.current().await.unwrap(), Some(doc(vec![marker(1, "B")])));
}

#[tokio::test]
async fn concurrent_saves_lose_no_state() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(manager(&dir));
    manager.save(doc(vec![marker(0, "seed")])).await.unwrap();

    let mut handles = Vec::new();
    for i in 1..=8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .save(doc(vec![marker(i, &format!("writer {}", i))]))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let ids = manager.store().snapshot_ids().await.unwrap();
    assert_eq!(ids.len(), 8);

    // Every state except the final one survives as exactly one snapshot.
    let mut ids_seen = Vec::new();
    for id in &ids {
        let document = manager.read_snapshot(id.as_str()).await.unwrap();
        ids_seen.push(document.records()[0].get("id").cloned().unwrap());
    }
    let current = manager.current().await.unwrap().unwrap();
    ids_seen.push(current.records()[0].get("id").cloned().unwrap());

    let mut numbers: Vec<i64> = ids_seen.iter().filter_map(|v| v.as_i64()).collect();
    numbers.sort();
    assert_eq!(numbers, (0..=8).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn managers_sharing_files_serialize_writes() {
    let dir = TempDir::new().unwrap();
    // Two managers over the same files stand in for the server and a CLI run.
    let first = Arc::new(manager(&dir));
    let second = Arc::new(manager(&dir));
    first.save(doc(vec![marker(0, "seed")])).await.unwrap();

    let mut handles = Vec::new();
    for i in 1..=10 {
        let manager = if i % 2 == 0 { first.clone() } else { second.clone() };
        handles.push(tokio::spawn(async move {
            manager
                .save(doc(vec![marker(i, &format!("writer {}", i))]))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let ids = first.store().snapshot_ids().await.unwrap();
    assert_eq!(ids.len(), 10);

    let mut seen = Vec::new();
    for id in &ids {
        let document = first.read_snapshot(id.as_str()).await.unwrap();
        seen.push(document.records()[0].get("id").and_then(|v| v.as_i64()).unwrap());
    }
    let current = first.current().await.unwrap().unwrap();
    seen.push(current.records()[0].get("id").and_then(|v| v.as_i64()).unwrap());

    seen.sort();
    assert_eq!(seen, (0..=10).collect::<Vec<_>>());
}
