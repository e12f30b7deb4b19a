//! Domain models for the segregation pipeline
//!
//! Income group records, the per-metro dataset, the index result tables and
//! the tract map layer.

pub mod dataset;
pub mod income;
pub mod map;
pub mod results;

use std::path::Path;

use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::utils::io::parquet::{read_parquet_table, write_parquet};

pub use dataset::{BlockGroup, DatasetRow, MetroDataset};
pub use income::{IncomeExtreme, IncomeGroup, IncomeGroupRecord};
pub use map::{MapFeature, MapLayer};
pub use results::{Artifact, IndexTable, ProfileIndex, ProfilePoint, ProfileTable};

/// Types that are stored as a single Arrow table
pub trait ArrowTable: Sized {
    /// Convert to a record batch
    fn to_record_batch(&self) -> Result<RecordBatch>;

    /// Convert from a record batch
    fn from_record_batch(batch: &RecordBatch) -> Result<Self>;

    /// Write to a Parquet file, returning the number of rows written
    fn write_parquet(&self, path: &Path) -> Result<usize> {
        let batch = self.to_record_batch()?;
        write_parquet(path, &batch)?;
        Ok(batch.num_rows())
    }

    /// Read from a Parquet file
    fn read_parquet(path: &Path) -> Result<Self> {
        Self::from_record_batch(&read_parquet_table(path, None)?)
    }
}
