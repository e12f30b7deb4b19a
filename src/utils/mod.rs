//! Utility modules: Parquet and JSON IO, logging, and test fixtures

pub mod io;
pub mod logging;
pub mod test;
