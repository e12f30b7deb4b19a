//! Atomic JSON persistence
//!
//! Data is written to a temp file next to the target, synced and renamed
//! over the target, so readers see either the old file or the new one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{IncsegError, Result};

/// Read and parse a JSON file, `None` when it does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IncsegError::io(path, e)),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

/// Write data to a JSON file atomically
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(data)?;
    let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

    let written = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(IncsegError::io(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        IncsegError::io(path, e)
    })
}
