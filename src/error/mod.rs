//! Error handling for the segregation pipeline.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for the pipeline, dashboard and figure generators
#[derive(Debug, thiserror::Error)]
pub enum IncsegError {
    /// Error opening, reading or writing a file
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
    /// Error in an Arrow compute or conversion kernel
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    /// Error converting typed rows to or from record batches
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_arrow::Error),
    /// Error reading or writing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A table is missing a column or has an unusable column type
    #[error("Schema error: {0}")]
    Schema(String),
    /// The metro code has no entry in the registry
    #[error("Metro {0} is not in the registry")]
    UnknownMetro(String),
    /// The metro has no block groups after filtering and joining
    #[error("No block groups found for metro {0}")]
    EmptyDataset(String),
    /// A geometry could not be parsed or projected
    #[error("Geometry error: {0}")]
    Geometry(String),
    /// The geography is split into several components
    #[error("Geography is not contiguous: {components} connected components")]
    Disconnected { components: usize },
    /// A segregation index could not be computed
    #[error("Index error: {0}")]
    Index(String),
    /// Artifacts for the metro have not been generated yet
    #[error("Data has not been generated for metro {0}")]
    NotGenerated(String),
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// A background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
    /// Error rendering a figure
    #[error("Plot error: {0}")]
    Plot(String),
}

impl IncsegError {
    /// Wrap an IO error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a schema error for a column that is absent
    pub fn missing_column(column: &str) -> Self {
        Self::Schema(format!("Column '{column}' not found"))
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, IncsegError>;
