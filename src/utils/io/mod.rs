//! IO utilities for Parquet tables, JSON files and artifact paths

pub mod json;
pub mod parquet;
pub mod paths;

pub use json::{read_json, write_json_atomic};
pub use parquet::{f64_column, read_parquet, read_parquet_table, string_column, write_parquet};
pub use paths::{FigurePaths, MetroPaths};
