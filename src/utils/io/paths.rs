//! Locations of per-metro artifacts and figures

use std::path::{Path, PathBuf};

use crate::models::income::IncomeExtreme;
use crate::models::results::{Artifact, ProfileIndex};

/// File name of the completion manifest inside a metro directory
pub const MANIFEST_FILE: &str = "manifest.json";
/// Marker written into a figure directory once every figure is saved
pub const COMPLETION_MARKER: &str = ".complete";

/// Artifact locations of one metro: `{root}/{metro}/{metro}_{stem}.parquet`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetroPaths {
    metro: String,
    dir: PathBuf,
}

impl MetroPaths {
    #[must_use]
    pub fn new(root: &Path, metro: &str) -> Self {
        Self {
            metro: metro.to_string(),
            dir: root.join(metro),
        }
    }

    #[must_use]
    pub fn metro(&self) -> &str {
        &self.metro
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn artifact(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(artifact.file_name(&self.metro))
    }

    #[must_use]
    pub fn manifest(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }
}

/// Figure locations of one metro under `{root}/{metro}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigurePaths {
    metro: String,
    dir: PathBuf,
}

impl FigurePaths {
    #[must_use]
    pub fn new(root: &Path, metro: &str) -> Self {
        Self {
            metro: metro.to_string(),
            dir: root.join(metro),
        }
    }

    #[must_use]
    pub fn singlegroup_dir(&self) -> PathBuf {
        self.dir.join("singlegroup")
    }

    #[must_use]
    pub fn multiscalar_dir(&self) -> PathBuf {
        self.dir.join("multiscalar")
    }

    /// `{m}_{index}_{group}.png` with the index name lowercased
    #[must_use]
    pub fn singlegroup_figure(&self, index: &str, group: IncomeExtreme) -> PathBuf {
        self.singlegroup_dir().join(format!(
            "{}_{}_{group}.png",
            self.metro,
            index.to_lowercase()
        ))
    }

    #[must_use]
    pub fn multiscalar_figure(&self, index: ProfileIndex) -> PathBuf {
        self.multiscalar_dir()
            .join(format!("{}_multiscalar_{index}.png", self.metro))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metro_layout() {
        let paths = MetroPaths::new(Path::new("/data"), "31080");
        assert_eq!(paths.dir(), Path::new("/data/31080"));
        assert_eq!(
            paths.artifact(Artifact::Multigroup),
            PathBuf::from("/data/31080/31080_multigroup.parquet")
        );
        assert_eq!(paths.manifest(), PathBuf::from("/data/31080/manifest.json"));
    }

    #[test]
    fn test_figure_layout() {
        let paths = FigurePaths::new(Path::new("figures"), "31080");
        assert_eq!(
            paths.singlegroup_figure("AbsoluteClustering", IncomeExtreme::Low),
            PathBuf::from("figures/31080/singlegroup/31080_absoluteclustering_low.png")
        );
        assert_eq!(
            paths.multiscalar_figure(ProfileIndex::Entropy),
            PathBuf::from("figures/31080/multiscalar/31080_multiscalar_entropy.png")
        );
    }
}
