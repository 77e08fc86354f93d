//! The `serve` command.

use markerd_core::{Config, VersionManager};
use markerd_server::AppState;
use std::path::Path;
use tracing::info;

/// Run the HTTP server until Ctrl-C.
pub async fn run_server(
    config: &Config,
    base_dir: &Path,
    address: Option<String>,
) -> anyhow::Result<()> {
    let manager = VersionManager::from_config(config, base_dir)?;
    info!(
        current = %manager.store().current_path().display(),
        backups = %manager.store().backup_dir().display(),
        "Serving markers"
    );

    let address = address.unwrap_or_else(|| config.bind_address());
    markerd_server::serve(AppState::new(manager), &address).await?;
    Ok(())
}
