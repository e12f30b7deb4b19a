//! Per-metro data pipeline
//!
//! [`DatasetBuilder`] turns the raw ACS tables into a [`MetroDataset`](crate::models::MetroDataset),
//! an [`IndexCalculator`] derives the index artifacts from it and
//! [`MetroBatchDriver`] runs both over many metros with skip, rebuild and
//! rollback semantics.

pub mod builder;
pub mod driver;
pub mod indices;
pub mod manifest;

pub use builder::{BlockGroupLayer, DatasetBuilder};
pub use driver::{BatchReport, MetroBatchDriver, MetroOutcome};
pub use indices::{IndexCalculator, StandardIndexCalculator};
pub use manifest::{ArtifactEntry, BuildMode, Manifest};
