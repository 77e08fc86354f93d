//! Server state.

use markerd_core::VersionManager;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<VersionManager>,
}

impl AppState {
    pub fn new(manager: VersionManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}
