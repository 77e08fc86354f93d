//! Shared utilities for markerd.
//!
//! This crate provides common utilities used across the markerd workspace:
//! - Logging setup with tracing
//! - Path utilities
//! - RAII-based timing for operation measurement

pub mod log;
pub mod path;
pub mod timing;

pub use log::{LogConfig, LogLevel};
pub use timing::TimingGuard;
