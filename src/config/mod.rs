//! Configuration for the segregation pipeline.
//!
//! Every field has a default so a partial TOML file (or none at all) is valid.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithm::connectivity::Contiguity;
use crate::error::{IncsegError, Result};

/// Environment variable that overrides `paths.data_dir`
pub const DATA_DIR_ENV: &str = "INCSEG_DATA_DIR";

/// First ACS 5-year vintage with block-group income data in the pipeline
pub const FIRST_YEAR: i32 = 2012;
/// Last ACS 5-year vintage in the pipeline
pub const LAST_YEAR: i32 = 2018;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncsegConfig {
    /// Input and output locations
    pub paths: PathConfig,
    /// Years, distance bands and contiguity rules
    pub analysis: AnalysisConfig,
    /// Dashboard server settings
    pub dashboard: DashboardConfig,
}

/// Input and output locations. Relative paths resolve against `data_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root directory for inputs and per-metro artifacts
    pub data_dir: PathBuf,
    /// Year-templated path of the ACS bracket tables (`{year}` placeholder)
    pub acs_template: String,
    /// Block-group geometries (`geoid`, WKT `geometry`)
    pub block_groups: PathBuf,
    /// Metro registry table
    pub registry: PathBuf,
    /// Year-templated path of the tract map layer used by the dashboard
    pub tract_template: String,
    /// Directory that holds one subdirectory per metro
    pub output_dir: PathBuf,
    /// Directory that holds one figure subdirectory per metro
    pub figures_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            acs_template: "acs/acs_{year}_X19_INCOME_bg.parquet".to_string(),
            block_groups: PathBuf::from("acs/bg_2018.parquet"),
            registry: PathBuf::from("msa_definitions.parquet"),
            tract_template: "acs/acs_{year}_tracts.parquet".to_string(),
            output_dir: PathBuf::from("."),
            figures_dir: PathBuf::from("figures"),
        }
    }
}

impl PathConfig {
    /// Resolve a configured path against the data directory
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Path of the ACS bracket table for one year
    #[must_use]
    pub fn acs_path(&self, year: i32) -> PathBuf {
        self.resolve(Path::new(&fill_year(&self.acs_template, year)))
    }

    /// Path of the tract map layer for one year
    #[must_use]
    pub fn tract_path(&self, year: i32) -> PathBuf {
        self.resolve(Path::new(&fill_year(&self.tract_template, year)))
    }

    #[must_use]
    pub fn block_groups_path(&self) -> PathBuf {
        self.resolve(&self.block_groups)
    }

    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.resolve(&self.registry)
    }

    #[must_use]
    pub fn output_root(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    #[must_use]
    pub fn figures_root(&self) -> PathBuf {
        self.resolve(&self.figures_dir)
    }
}

fn fill_year(template: &str, year: i32) -> String {
    template.replace("{year}", &year.to_string())
}

/// Analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// First year of the time series (inclusive)
    pub start_year: i32,
    /// Last year of the time series (inclusive)
    pub end_year: i32,
    /// Distance bands in projected units (metres) for multiscalar profiles
    pub distances: Vec<u32>,
    /// Contiguity rule used by the connectivity filter and SpatialDissim
    pub contiguity: Contiguity,
    /// Restrict every metro to its largest connected component
    pub island_handling: bool,
    /// Number of metros processed concurrently (0 = one per CPU)
    pub jobs: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_year: FIRST_YEAR,
            end_year: LAST_YEAR,
            distances: default_distances(),
            contiguity: Contiguity::Queen,
            island_handling: false,
            jobs: 1,
        }
    }
}

impl AnalysisConfig {
    /// Years covered by the analysis, in ascending order
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        (self.start_year..=self.end_year).collect()
    }

    /// Worker count with `0` mapped to the number of CPUs
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

/// Distance bands 500, 1000, ..., 5000
#[must_use]
pub fn default_distances() -> Vec<u32> {
    (500..5500).step_by(500).collect()
}

/// Dashboard settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Socket address the server binds to
    pub addr: String,
    /// Year shown on the map when none is selected
    pub default_map_year: i32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8501".to_string(),
            default_map_year: LAST_YEAR,
        }
    }
}

impl IncsegConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| IncsegError::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| IncsegError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.paths.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if analysis.start_year > analysis.end_year {
            return Err(IncsegError::Config(format!(
                "start_year {} is after end_year {}",
                analysis.start_year, analysis.end_year
            )));
        }
        if analysis.distances.is_empty() || analysis.distances.contains(&0) {
            return Err(IncsegError::Config(
                "distances must be a non-empty list of positive values".to_string(),
            ));
        }
        if !self.paths.acs_template.contains("{year}") {
            return Err(IncsegError::Config(
                "acs_template must contain a {year} placeholder".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for IncsegConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline Configuration:")?;
        writeln!(f, "  Data Directory: {}", self.paths.data_dir.display())?;
        writeln!(f, "  ACS Tables: {}", self.paths.acs_template)?;
        writeln!(f, "  Block Groups: {}", self.paths.block_groups.display())?;
        writeln!(f, "  Registry: {}", self.paths.registry.display())?;
        writeln!(
            f,
            "  Years: {}-{}",
            self.analysis.start_year, self.analysis.end_year
        )?;
        writeln!(f, "  Distance Bands: {:?}", self.analysis.distances)?;
        writeln!(f, "  Contiguity: {:?}", self.analysis.contiguity)?;
        writeln!(f, "  Island Handling: {}", self.analysis.island_handling)?;
        Ok(())
    }
}
