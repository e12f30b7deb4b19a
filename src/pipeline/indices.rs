//! Index computation over a built dataset

use std::time::Instant;

use crate::algorithm::connectivity::Contiguity;
use crate::algorithm::segregation::dynamics::{multigroup_tempdyn, singlegroup_tempdyn, spacetime_dyn};
use crate::algorithm::spatial::SpatialContext;
use crate::config::AnalysisConfig;
use crate::error::{IncsegError, Result};
use crate::models::ArrowTable;
use crate::models::dataset::MetroDataset;
use crate::models::results::Artifact;
use crate::pipeline::manifest::ArtifactEntry;
use crate::utils::io::paths::MetroPaths;

/// Computes the index artifacts of a metro and writes them to its directory
pub trait IndexCalculator: Send + Sync {
    /// Write every index artifact, returning one entry per written file.
    /// Stops at the first failure.
    fn calc_indices(&self, dataset: &MetroDataset, paths: &MetroPaths) -> Result<Vec<ArtifactEntry>>;
}

/// The multi-group table, both single-group tables and four multiscalar
/// profiles
#[derive(Debug, Clone)]
pub struct StandardIndexCalculator {
    contiguity: Contiguity,
    distances: Vec<u32>,
}

impl StandardIndexCalculator {
    #[must_use]
    pub fn new(analysis: &AnalysisConfig) -> Self {
        Self {
            contiguity: analysis.contiguity,
            distances: analysis.distances.clone(),
        }
    }

    fn compute(
        &self,
        artifact: Artifact,
        dataset: &MetroDataset,
        ctx: &SpatialContext,
        paths: &MetroPaths,
    ) -> Result<usize> {
        let path = paths.artifact(artifact);
        match artifact {
            Artifact::Multigroup => multigroup_tempdyn(dataset, ctx)?.write_parquet(&path),
            Artifact::Singlegroup { group } => {
                singlegroup_tempdyn(dataset, ctx, group.group())?.write_parquet(&path)
            }
            Artifact::Spacetime { index, group } => {
                spacetime_dyn(dataset, ctx, index.index(), group.group(), &self.distances)?
                    .write_parquet(&path)
            }
            Artifact::IncomeData => dataset.write_parquet(&path),
        }
    }
}

impl IndexCalculator for StandardIndexCalculator {
    fn calc_indices(&self, dataset: &MetroDataset, paths: &MetroPaths) -> Result<Vec<ArtifactEntry>> {
        if dataset.is_empty() {
            return Err(IncsegError::EmptyDataset(dataset.metro.clone()));
        }
        let ctx = SpatialContext::from_geometries(&dataset.geometries(), self.contiguity)?;

        Artifact::RESULTS
            .iter()
            .map(|&artifact| {
                let start = Instant::now();
                let rows = self.compute(artifact, dataset, &ctx, paths)?;
                log::info!(
                    "Metro {}: {artifact} written in {:?}",
                    dataset.metro,
                    start.elapsed()
                );
                Ok(ArtifactEntry::new(artifact, &dataset.metro, rows))
            })
            .collect()
    }
}
