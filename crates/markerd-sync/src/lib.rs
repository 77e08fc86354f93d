//! Remote mirroring for markerd.
//!
//! The local store is the source of truth; this crate keeps a copy of the
//! current document in a remote versioned file store. Every update is
//! conditional on the version token last observed for the remote file:
//!
//! ```text
//! fetch token -> write(content, token) -> synced
//!                                       -> conflict (token stale, refetch)
//!                                       -> failed
//! ```
//!
//! [`GitHubStore`] implements the [`RemoteStore`] contract on top of the
//! GitHub contents API; [`SyncClient`] tracks the token between pushes.

mod client;
mod error;
mod github;
mod remote;

pub use client::SyncClient;
pub use error::{SyncError, SyncResult};
pub use github::{GitHubConfig, GitHubStore, DEFAULT_API_URL};
pub use remote::{RemoteRef, RemoteStore};
