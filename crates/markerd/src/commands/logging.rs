//! Logging initialization.

use markerd_core::Config;
use markerd_util::{LogConfig, LogLevel};
use std::path::PathBuf;

/// Initialize logging to stderr, or to the default log file when `to_file`.
///
/// The server logs at info by default; one-shot commands only report
/// warnings unless `--verbose` is given. Returns the log file path if
/// logging to a file.
pub fn init_logging(config: &Config, verbose: bool, serving: bool, to_file: bool) -> Option<PathBuf> {
    let configured = config.log_level.as_deref().and_then(LogLevel::parse);
    let level = if verbose {
        LogLevel::Debug
    } else if let Some(level) = configured {
        level
    } else if serving {
        LogLevel::Info
    } else {
        LogLevel::Warn
    };

    let file = if to_file {
        markerd_util::log::default_log_path()
    } else {
        None
    };

    markerd_util::log::init(LogConfig {
        level,
        include_location: verbose,
        file,
        ..LogConfig::default()
    })
}
