//! Command handlers for the markerd CLI.

pub mod config;
pub mod history;
pub mod logging;
pub mod serve;

pub use config::*;
pub use history::*;
pub use logging::*;
pub use serve::*;
