use incseg::IncsegError;
use incseg::models::dataset::MetroDataset;
use incseg::pipeline::{
    ArtifactEntry, BlockGroupLayer, DatasetBuilder, IndexCalculator, MetroBatchDriver,
    StandardIndexCalculator,
};
use incseg::registry::MetroRegistry;
use incseg::utils::io::paths::MetroPaths;
use incseg::utils::test::{SyntheticData, synthetic_workspace};
use incseg::{IncsegConfig, Result};
use tempfile::TempDir;

/// Synthetic inputs written to a scratch directory, loaded and ready to build
pub struct Workspace {
    pub dir: TempDir,
    pub config: IncsegConfig,
    pub registry: MetroRegistry,
    pub block_groups: BlockGroupLayer,
}

impl Workspace {
    pub fn new(data: &SyntheticData) -> Self {
        let dir = tempfile::tempdir().expect("Should create scratch directory");
        let config = synthetic_workspace(dir.path(), data).expect("Should write synthetic inputs");
        let registry =
            MetroRegistry::load(&config.paths.registry_path()).expect("Should load registry");
        let block_groups = BlockGroupLayer::load(&config.paths.block_groups_path())
            .expect("Should load block groups");
        Self {
            dir,
            config,
            registry,
            block_groups,
        }
    }

    pub fn builder(&self) -> DatasetBuilder<'_> {
        DatasetBuilder::new(
            &self.config.paths,
            &self.config.analysis,
            &self.registry,
            &self.block_groups,
        )
    }

    pub fn driver(&self, jobs: usize) -> MetroBatchDriver<'_> {
        self.driver_with(StandardIndexCalculator::new(&self.config.analysis), jobs)
    }

    pub fn driver_with<C: IndexCalculator>(&self, calculator: C, jobs: usize) -> MetroBatchDriver<'_, C> {
        MetroBatchDriver::new(self.builder(), calculator, &self.config.paths.output_root(), jobs)
    }

    pub fn metro_paths(&self, metro: &str) -> MetroPaths {
        MetroPaths::new(&self.config.paths.output_root(), metro)
    }
}

/// Writes a stray file into the metro directory, then fails
pub struct FailingCalculator;

impl IndexCalculator for FailingCalculator {
    fn calc_indices(&self, dataset: &MetroDataset, paths: &MetroPaths) -> Result<Vec<ArtifactEntry>> {
        std::fs::write(paths.dir().join("partial.parquet"), b"partial")
            .map_err(|e| IncsegError::io(paths.dir(), e))?;
        Err(IncsegError::Index(format!("{} failed on purpose", dataset.metro)))
    }
}
