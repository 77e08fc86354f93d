//! Backup commands: history, show, restore, save.

use anyhow::Context;
use markerd_core::{Config, Diff, Document, SaveOutcome, VersionManager};
use std::io::Read;
use std::path::Path;

/// Print every backup, newest first, with its diff against the one before.
pub async fn show_history(config: &Config, base_dir: &Path, json: bool) -> anyhow::Result<()> {
    let manager = VersionManager::from_config(config, base_dir)?;
    let history = manager.list_history().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    if history.is_empty() {
        println!("No backups in {}", manager.store().backup_dir().display());
        return Ok(());
    }

    println!(
        "{:<44} {:<20} {:>6}  {}",
        "BACKUP", "CREATED (UTC)", "COUNT", "CHANGES"
    );
    for entry in &history {
        let count = if entry.corrupt {
            "corrupt".to_string()
        } else {
            entry.record_count.to_string()
        };
        println!(
            "{:<44} {:<20} {:>6}  {}",
            entry.id.as_str(),
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            count,
            describe(&entry.diff)
        );
    }
    Ok(())
}

/// Print one backup as JSON.
pub async fn show_backup(config: &Config, base_dir: &Path, id: &str) -> anyhow::Result<()> {
    let manager = VersionManager::from_config(config, base_dir)?;
    let document = manager.read_snapshot(id).await?;
    println!("{}", document.to_pretty_json()?);
    Ok(())
}

pub async fn restore_backup(config: &Config, base_dir: &Path, id: &str) -> anyhow::Result<()> {
    let manager = VersionManager::from_config(config, base_dir)?;
    let outcome = manager.restore(id).await?;
    report(&outcome, &format!("Restored {}", id));
    Ok(())
}

/// Save a document from `file`, or stdin when `None` or `-`.
pub async fn save_document(
    config: &Config,
    base_dir: &Path,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let content = match file.filter(|f| f.as_os_str() != "-") {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    let document: Document =
        serde_json::from_str(&content).context("input is not a JSON array of objects")?;

    let manager = VersionManager::from_config(config, base_dir)?;
    let records = document.len();
    let outcome = manager.save(document).await?;
    report(&outcome, &format!("Saved {} markers", records));
    Ok(())
}

fn report(outcome: &SaveOutcome, summary: &str) {
    match &outcome.backup {
        Some(backup) => println!("{} (previous state in {})", summary, backup),
        None => println!("{}", summary),
    }
    if let Some(remote) = &outcome.remote {
        println!("Synced remote at {}", remote);
    }
    if let Some(warning) = &outcome.warning {
        eprintln!("Warning: {}", warning);
    }
}

fn describe(diff: &Diff) -> String {
    if diff.is_empty() {
        return "-".to_string();
    }

    let mut parts = vec![format!(
        "+{} -{} ~{}",
        diff.added, diff.removed, diff.changed
    )];
    if !diff.fields.is_empty() {
        let fields: Vec<String> = diff
            .fields
            .iter()
            .map(|(field, count)| format!("{}:{}", field, count))
            .collect();
        parts.push(format!("({})", fields.join(", ")));
    }
    parts.join(" ")
}
