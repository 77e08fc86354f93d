//! Logging setup using tracing.
//!
//! This module provides consistent logging configuration across markerd.

use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose events pass the default filter.
const CRATES: &[&str] = &[
    "markerd",
    "markerd_core",
    "markerd_snapshot",
    "markerd_sync",
    "markerd_server",
    "tower_http",
];

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level for markerd crates.
    pub level: LogLevel,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Whether to emit ANSI colors (ignored when logging to a file).
    pub ansi: bool,
    /// Log file path. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_location: false,
            ansi: true,
            file: None,
        }
    }
}

impl LogConfig {
    /// Build the `EnvFilter` directive for the configured level.
    pub fn filter_directive(&self) -> String {
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initialize logging with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Returns the log
/// file path when logging to a file. This should be called once at startup.
pub fn init(config: LogConfig) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let subscriber = tracing_subscriber::registry().with(filter);

    if let Some(path) = &config.file {
        match open_log_file(path) {
            Ok(file) => {
                let fmt_layer = fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(file);
                subscriber.with(fmt_layer).init();
                return Some(path.clone());
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {}: {e}", path.display());
            }
        }
    }

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_ansi(config.ansi)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(std::io::stderr);
    subscriber.with(fmt_layer).init();
    None
}

fn open_log_file(path: &std::path::Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

/// Get the default log file path.
pub fn default_log_path() -> Option<PathBuf> {
    crate::path::logs_dir().map(|p| p.join("markerd.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("invalid"), None);
    }

    #[test]
    fn test_filter_directive_covers_workspace_crates() {
        let config = LogConfig {
            level: LogLevel::Debug,
            ..LogConfig::default()
        };
        let directive = config.filter_directive();
        assert!(directive.starts_with("markerd=debug,"));
        assert!(directive.contains("markerd_snapshot=debug"));
        assert!(directive.contains("tower_http=debug"));
    }

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert!(config.file.is_none());
        assert_eq!(config.level, LogLevel::Info);
    }
}
