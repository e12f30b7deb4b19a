//! Completion manifest of a metro directory
//!
//! The manifest is the last file written for a metro. A directory without
//! one is incomplete and gets rebuilt.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::results::Artifact;
use crate::utils::io::json::{read_json, write_json_atomic};
use crate::utils::io::paths::MetroPaths;

/// How the dataset of a metro was built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    /// Every block group of the metro's counties
    #[default]
    Standard,
    /// Only the largest contiguous component
    LargestComponent,
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::LargestComponent => write!(f, "largest component"),
        }
    }
}

/// One file written for a metro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub artifact: Artifact,
    /// File name relative to the metro directory
    pub file: String,
    pub rows: usize,
}

impl ArtifactEntry {
    #[must_use]
    pub fn new(artifact: Artifact, metro: &str, rows: usize) -> Self {
        Self {
            artifact,
            file: artifact.file_name(metro),
            rows,
        }
    }
}

/// Record of a fully built metro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub metro: String,
    pub completed_at: DateTime<Utc>,
    pub mode: BuildMode,
    /// Number of block groups in the dataset
    pub units: usize,
    pub artifacts: Vec<ArtifactEntry>,
}

impl Manifest {
    /// Read the manifest of a metro directory, `None` if it is absent
    pub fn read(paths: &MetroPaths) -> Result<Option<Self>> {
        read_json(&paths.manifest())
    }

    /// Write the manifest atomically
    pub fn write(&self, paths: &MetroPaths) -> Result<()> {
        write_json_atomic(&paths.manifest(), self)
    }

    /// Entry of one artifact
    #[must_use]
    pub fn entry(&self, artifact: Artifact) -> Option<&ArtifactEntry> {
        self.artifacts.iter().find(|entry| entry.artifact == artifact)
    }
}
