//! Utility functions for working with Parquet files

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::{ProjectionMask, arrow_reader::ParquetRecordBatchReaderBuilder};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::util::safe_open_file;
use crate::error::{IncsegError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Read a Parquet file into Arrow record batches
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `columns` - Optional column names to project; missing names are skipped
///
/// # Errors
/// Returns an error if the file cannot be opened or is not valid Parquet
pub fn read_parquet(path: &Path, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = safe_open_file(path, "reading a parquet table")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let reader = match columns.and_then(|names| projection(names, &builder)) {
        Some(mask) => builder.with_projection(mask).build()?,
        None => builder.build()?,
    };

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    log_operation_complete("read", path, batches.len(), Some(start.elapsed()));
    Ok(batches)
}

fn projection(
    names: &[&str],
    builder: &ParquetRecordBatchReaderBuilder<File>,
) -> Option<ProjectionMask> {
    let file_schema = builder.schema();
    let indices: Vec<usize> = names
        .iter()
        .filter_map(|name| match file_schema.index_of(name) {
            Ok(idx) => Some(idx),
            Err(_) => {
                log_warning(&format!("Field {name} not found in parquet file, skipping"), None);
                None
            }
        })
        .collect();

    if indices.is_empty() {
        log_warning(
            "No matching fields found in schema projection, reading all columns",
            None,
        );
        None
    } else {
        Some(ProjectionMask::roots(builder.parquet_schema(), indices))
    }
}

/// Read a Parquet file into a single record batch
pub fn read_parquet_table(path: &Path, columns: Option<&[&str]>) -> Result<RecordBatch> {
    let batches = read_parquet(path, columns)?;
    match batches.first() {
        Some(first) => Ok(concat_batches(&first.schema(), &batches)?),
        None => {
            // An empty file still has a schema
            let file = safe_open_file(path, "reading a parquet schema")?;
            let schema = ParquetRecordBatchReaderBuilder::try_new(file)?.schema().clone();
            Ok(RecordBatch::new_empty(schema))
        }
    }
}

/// Write a record batch to a Snappy compressed Parquet file
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let start = std::time::Instant::now();
    log_operation_start("Writing parquet file", path);

    let file = File::create(path).map_err(|e| IncsegError::io(path, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    log_operation_complete("wrote", path, batch.num_rows(), Some(start.elapsed()));
    Ok(())
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| IncsegError::missing_column(name))
}

/// Numeric column cast to `f64`, with nulls replaced by `fill`
pub fn f64_column(batch: &RecordBatch, name: &str, fill: f64) -> Result<Vec<f64>> {
    let array = column(batch, name)?;
    if !array.data_type().is_numeric() {
        return Err(IncsegError::Schema(format!(
            "Column '{name}' has type {}, expected a numeric type",
            array.data_type()
        )));
    }
    let casted = cast(array, &DataType::Float64)?;
    let values = casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| IncsegError::Schema(format!("Column '{name}' could not be cast to Float64")))?;
    Ok(values.iter().map(|v| v.unwrap_or(fill)).collect())
}

/// Column cast to strings, with nulls replaced by the empty string
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<Vec<String>> {
    let array = column(batch, name)?;
    let casted = cast(array, &DataType::Utf8)?;
    let values = casted
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| IncsegError::Schema(format!("Column '{name}' could not be cast to Utf8")))?;
    Ok(values
        .iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

/// Attach key/value metadata to the schema of a batch
pub fn with_metadata(
    batch: RecordBatch,
    metadata: impl IntoIterator<Item = (String, String)>,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut entries = schema.metadata().clone();
    entries.extend(metadata);
    let schema = Arc::new(Schema::new_with_metadata(schema.fields().clone(), entries));
    Ok(batch.with_schema(schema)?)
}
