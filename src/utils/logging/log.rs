//! Logging utilities
//!
//! Standardized messages for file operations and per-metro builds.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

/// Log an operation start with consistent format
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `path` - Path of the file or directory being operated on
pub fn log_operation_start(operation: &str, path: &Path) {
    log::debug!("{} {}", operation, path.display());
}

/// Log an operation completion with consistent format
///
/// # Arguments
/// * `operation` - Past tense verb for the operation
/// * `path` - Path of the file or directory that was operated on
/// * `items` - Number of batches, rows or files processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(operation: &str, path: &Path, items: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::debug!(
            "Successfully {} {} items at {} in {:?}",
            operation,
            items,
            path.display(),
            duration
        ),
        None => log::debug!("Successfully {} {} items at {}", operation, items, path.display()),
    }
}

/// Log an operation warning with consistent format
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{}: {}", message, path.display());
    } else {
        log::warn!("{message}");
    }
}

/// Log the start of a metro build
pub fn log_metro_start(metro: &str, mode: impl Display) {
    log::info!("Building metro {metro} ({mode})");
}

/// Log a failed metro build. The metro id is always part of the message.
pub fn log_metro_failure(metro: &str, error: &dyn Display) {
    log::error!("Metro {metro} failed: {error}");
}
