//! Core of markerd: configuration and the version manager.
//!
//! [`VersionManager`] composes the snapshot store, retention policy, diff
//! engine and remote mirror into the operations exposed to clients:
//! save, list history, read a snapshot and restore.

pub mod config;
pub mod error;
pub mod manager;

pub use config::Config;
pub use error::{ConfigError, CoreError, CoreResult};
pub use manager::{HistoryEntry, SaveOutcome, SaveStatus, VersionManager};

pub use markerd_snapshot::{
    Diff, DiffEngine, Document, Record, RetentionPolicy, SnapshotId, SnapshotStore,
};
