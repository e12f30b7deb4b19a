//! Utility functions for error handling
//!
//! Filesystem helpers that attach the offending path and a short purpose
//! to IO failures.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{IncsegError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(IncsegError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found, needed for: {purpose}"),
            ),
        ));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "Permission denied - check file permissions".to_string(),
            _ => format!("Failed to open file for: {purpose}"),
        };
        IncsegError::io(path, io::Error::new(e.kind(), format!("{context}: {e}")))
    })
}

/// Remove a directory tree, treating an already missing directory as success
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IncsegError::io(path, e)),
    }
}

/// Create a directory and all of its parents
pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| IncsegError::io(path, e))
}
