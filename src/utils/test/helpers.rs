//! Test helper functions

use std::path::Path;

use crate::config::{AnalysisConfig, IncsegConfig, PathConfig};
use crate::error::Result;
use crate::utils::test::fixtures::SyntheticData;

/// Configuration rooted at `data_dir` covering the given years, with a
/// short distance list to keep profiles cheap
#[must_use]
pub fn test_config(data_dir: &Path, years: &[i32]) -> IncsegConfig {
    let mut config = IncsegConfig {
        paths: PathConfig {
            data_dir: data_dir.to_path_buf(),
            output_dir: "output".into(),
            figures_dir: "figures".into(),
            ..PathConfig::default()
        },
        analysis: AnalysisConfig {
            distances: vec![500, 1000, 2000],
            ..AnalysisConfig::default()
        },
        ..IncsegConfig::default()
    };
    if let (Some(first), Some(last)) = (years.first(), years.last()) {
        config.analysis.start_year = *first;
        config.analysis.end_year = *last;
    }
    config
}

/// Write synthetic inputs into `data_dir` and return a matching configuration
pub fn synthetic_workspace(data_dir: &Path, data: &SyntheticData) -> Result<IncsegConfig> {
    let config = test_config(data_dir, &data.years);
    data.write(&config.paths)?;
    Ok(config)
}
