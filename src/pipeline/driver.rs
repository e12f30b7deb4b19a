//! Batch driver over metros
//!
//! Each metro is built into its own directory. A metro with a manifest is
//! skipped, a directory without one is purged and rebuilt, and a failed
//! build removes whatever it wrote so no partial directory survives.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rayon::prelude::*;

use crate::error::util::{create_dir_all, remove_dir_if_exists};
use crate::error::{IncsegError, Result};
use crate::models::ArrowTable;
use crate::models::dataset::MetroDataset;
use crate::models::results::Artifact;
use crate::pipeline::builder::DatasetBuilder;
use crate::pipeline::indices::{IndexCalculator, StandardIndexCalculator};
use crate::pipeline::manifest::{ArtifactEntry, BuildMode, Manifest};
use crate::utils::io::paths::MetroPaths;
use crate::utils::logging::{
    create_main_progress_bar, finish_progress_bar, log_metro_failure, log_metro_start,
};

/// Result of processing one metro
#[derive(Debug, Clone, PartialEq)]
pub enum MetroOutcome {
    /// Every artifact was written and the manifest committed
    Completed(Manifest),
    /// A manifest already existed
    Skipped { metro: String },
    /// The build failed and its directory was removed
    Failed { metro: String, reason: String },
}

impl MetroOutcome {
    #[must_use]
    pub fn metro(&self) -> &str {
        match self {
            Self::Completed(manifest) => &manifest.metro,
            Self::Skipped { metro } | Self::Failed { metro, .. } => metro,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcomes of a batch run, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<MetroOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, MetroOutcome::Completed(_)))
            .count()
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, MetroOutcome::Skipped { .. }))
            .count()
    }

    /// `(metro, reason)` of every failed metro
    #[must_use]
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                MetroOutcome::Failed { metro, reason } => Some((metro.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(MetroOutcome::is_failure)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} metros: {} completed, {} skipped, {} failed",
            self.outcomes.len(),
            self.completed(),
            self.skipped(),
            self.failures().len()
        )?;
        for (metro, reason) in self.failures() {
            write!(f, "\n  {metro}: {reason}")?;
        }
        Ok(())
    }
}

/// Builds and stores metros, optionally on a rayon pool
pub struct MetroBatchDriver<'a, C: IndexCalculator = StandardIndexCalculator> {
    builder: DatasetBuilder<'a>,
    calculator: C,
    output_root: PathBuf,
    jobs: usize,
}

impl<'a, C: IndexCalculator> MetroBatchDriver<'a, C> {
    #[must_use]
    pub fn new(builder: DatasetBuilder<'a>, calculator: C, output_root: &Path, jobs: usize) -> Self {
        Self {
            builder,
            calculator,
            output_root: output_root.to_path_buf(),
            jobs: jobs.max(1),
        }
    }

    #[must_use]
    pub fn paths(&self, metro: &str) -> MetroPaths {
        MetroPaths::new(&self.output_root, metro)
    }

    /// Build and store one metro with every block group
    pub fn store_data(&self, metro: &str) -> MetroOutcome {
        self.store(metro, BuildMode::Standard)
    }

    /// Build and store one metro restricted to its largest component
    pub fn store_data_with_island_handling(&self, metro: &str) -> MetroOutcome {
        self.store(metro, BuildMode::LargestComponent)
    }

    /// Process a list of metros, continuing past failures
    pub fn run_batch(&self, metros: &[String], mode: BuildMode) -> Result<BatchReport> {
        let pb = create_main_progress_bar(metros.len() as u64, Some("Building metros"));
        let run = |metro: &String| {
            let outcome = self.store(metro, mode);
            pb.inc(1);
            outcome
        };

        let outcomes: Vec<MetroOutcome> = if self.jobs <= 1 {
            metros.iter().map(run).collect()
        } else {
            log::info!("Processing {} metros on {} threads", metros.len(), self.jobs);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| IncsegError::Task(format!("Failed to start worker pool: {e}")))?;
            pool.install(|| metros.par_iter().map(run).collect())
        };

        let report = BatchReport { outcomes };
        finish_progress_bar(&pb, Some("Metros done"));
        log::info!("{report}");
        Ok(report)
    }

    fn store(&self, metro: &str, mode: BuildMode) -> MetroOutcome {
        let paths = self.paths(metro);
        match Manifest::read(&paths) {
            Ok(Some(_)) => {
                log::info!("Metro {metro} already has a manifest, skipping");
                return MetroOutcome::Skipped {
                    metro: metro.to_string(),
                };
            }
            Ok(None) => {}
            Err(e) => log::warn!("Metro {metro}: unreadable manifest ({e}), rebuilding"),
        }

        log_metro_start(metro, mode);
        match self.build(&paths, mode) {
            Ok(manifest) => {
                log::info!(
                    "Metro {metro} complete: {} block groups, {} artifacts",
                    manifest.units,
                    manifest.artifacts.len()
                );
                MetroOutcome::Completed(manifest)
            }
            Err(e) => {
                log_metro_failure(metro, &e);
                if let Err(cleanup) = remove_dir_if_exists(paths.dir()) {
                    log::warn!("Metro {metro}: could not remove partial output: {cleanup}");
                }
                MetroOutcome::Failed {
                    metro: metro.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn build(&self, paths: &MetroPaths, mode: BuildMode) -> Result<Manifest> {
        let metro = paths.metro();
        if paths.dir().exists() {
            log::info!("Metro {metro}: removing incomplete output");
            remove_dir_if_exists(paths.dir())?;
        }

        let dataset: MetroDataset = match mode {
            BuildMode::Standard => self.builder.generate_dataset(metro)?,
            BuildMode::LargestComponent => self.builder.generate_dataset_with_island_handling(metro)?,
        };

        create_dir_all(paths.dir())?;
        let rows = dataset.write_parquet(&paths.artifact(Artifact::IncomeData))?;
        let mut artifacts = vec![ArtifactEntry::new(Artifact::IncomeData, metro, rows)];
        artifacts.extend(self.calculator.calc_indices(&dataset, paths)?);

        let manifest = Manifest {
            metro: metro.to_string(),
            completed_at: Utc::now(),
            mode,
            units: dataset.units.len(),
            artifacts,
        };
        manifest.write(paths)?;
        Ok(manifest)
    }
}
