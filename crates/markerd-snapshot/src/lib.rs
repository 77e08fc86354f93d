//! Versioned marker document store for markerd.
//!
//! This crate owns the on-disk state of the marker collection:
//! - The current document, replaced atomically on every save
//! - Timestamp-named backups of every previous state
//! - A structural diff between consecutive backups
//! - A retention policy bounding how many backups are kept
//!
//! # Example
//!
//! ```no_run
//! use markerd_snapshot::{Document, SnapshotStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SnapshotStore::new("data/markers.json", "markers-backups");
//!
//! let document: Document = serde_json::from_str(r#"[{"id": 1, "name": "Stand A"}]"#)?;
//! let backup = store.save(&document).await?;
//!
//! if let Some(id) = backup {
//!     let previous = store.read(id.as_str()).await?;
//!     println!("backed up {} markers", previous.len());
//! }
//! # Ok(())
//! # }
//! ```

mod diff;
mod document;
mod error;
mod retention;
mod snapshot;
mod store;

pub use diff::{Diff, DiffEngine};
pub use document::{Document, Record, RecordKey, DEFAULT_ID_FIELD};
pub use error::{SnapshotError, SnapshotResult};
pub use retention::{RetentionPolicy, DEFAULT_MAX_SNAPSHOTS};
pub use snapshot::{SnapshotEntry, SnapshotId, SNAPSHOT_EXTENSION, SNAPSHOT_PREFIX};
pub use store::{SnapshotStore, WriterLock};
