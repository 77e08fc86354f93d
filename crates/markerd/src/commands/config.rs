//! Locating and loading configuration.

use anyhow::Context;
use markerd_core::Config;
use std::path::{Path, PathBuf};

/// Load configuration and the directory relative paths resolve against.
///
/// With an explicit file, that file replaces the project config and its
/// directory becomes the base. Otherwise the working directory is searched.
pub async fn load_config(file: Option<&Path>, cwd: &Path) -> anyhow::Result<(Config, PathBuf)> {
    let Some(file) = file else {
        let (config, _sources) = Config::load(Some(cwd)).await?;
        return Ok((config, cwd.to_path_buf()));
    };

    let path = markerd_util::path::resolve(cwd, file);
    let (global, _sources) = Config::load(None).await?;
    let project = Config::load_file(&path)
        .await
        .with_context(|| format!("failed to load config {}", path.display()))?;

    let mut config = global.merge(project);
    config.apply_env(|name| std::env::var(name).ok());
    config.validate()?;

    let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
    Ok((config, base))
}
