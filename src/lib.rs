//! A Rust library for computing residential income segregation indices for
//! U.S. metropolitan areas from ACS block-group income tables, with static
//! figures and an interactive dashboard over the results.

pub mod algorithm;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod plot;
pub mod registry;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::IncsegConfig;
pub use error::{IncsegError, Result};
pub use registry::{MetroDefinition, MetroRegistry};

// Data models
pub use models::{
    Artifact, ArrowTable, IncomeExtreme, IncomeGroup, IndexTable, MetroDataset, ProfileIndex,
    ProfileTable,
};

// Pipeline
pub use pipeline::{
    BatchReport, BlockGroupLayer, BuildMode, DatasetBuilder, IndexCalculator, Manifest,
    MetroBatchDriver, MetroOutcome, StandardIndexCalculator,
};

// Figures and dashboard
pub use dashboard::{Dashboard, DashboardView, Selection, build_router};
pub use plot::{FigureGenerator, FigureOutcome};
