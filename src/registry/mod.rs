//! Metro registry
//!
//! Maps CBSA codes to their title and member county FIPS codes. The registry
//! table has one row per member county.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::error::{IncsegError, Result};
use crate::models::ArrowTable;
use crate::utils::io::parquet::{read_parquet_table, string_column};

pub const CODE_COLUMN: &str = "CBSA Code";
pub const TITLE_COLUMN: &str = "CBSA Title";
pub const COUNTY_COLUMN: &str = "stcofips";

/// One row of the registry table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsaDefinitionRow {
    #[serde(rename = "CBSA Code")]
    pub code: String,
    #[serde(rename = "CBSA Title")]
    pub title: String,
    pub stcofips: String,
}

/// A metro and its member counties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetroDefinition {
    pub code: String,
    pub title: String,
    pub counties: BTreeSet<String>,
}

/// All metros, keyed by CBSA code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetroRegistry {
    metros: BTreeMap<String, MetroDefinition>,
}

impl MetroRegistry {
    /// Load the registry table from a Parquet file
    pub fn load(path: &Path) -> Result<Self> {
        let batch = read_parquet_table(path, Some(&[CODE_COLUMN, TITLE_COLUMN, COUNTY_COLUMN][..]))?;
        let registry = Self::from_record_batch(&batch)?;
        log::info!("Loaded {} metros from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// Build a registry from table rows. The first title seen for a code wins.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = MsaDefinitionRow>) -> Self {
        let mut metros: BTreeMap<String, MetroDefinition> = BTreeMap::new();
        for row in rows {
            let code = row.code.trim().to_string();
            if code.is_empty() {
                continue;
            }
            let entry = metros.entry(code.clone()).or_insert_with(|| MetroDefinition {
                code,
                title: row.title.clone(),
                counties: BTreeSet::new(),
            });
            let county = row.stcofips.trim();
            if !county.is_empty() {
                entry.counties.insert(county.to_string());
            }
        }
        Self { metros }
    }

    /// Build a registry from complete definitions
    #[must_use]
    pub fn from_definitions(definitions: impl IntoIterator<Item = MetroDefinition>) -> Self {
        Self {
            metros: definitions
                .into_iter()
                .map(|definition| (definition.code.clone(), definition))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metros.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metros.is_empty()
    }

    pub fn get(&self, code: &str) -> Result<&MetroDefinition> {
        self.metros
            .get(code)
            .ok_or_else(|| IncsegError::UnknownMetro(code.to_string()))
    }

    /// County FIPS codes of a metro
    pub fn counties(&self, code: &str) -> Result<&BTreeSet<String>> {
        Ok(&self.get(code)?.counties)
    }

    /// All metros sorted by code
    pub fn metros(&self) -> impl Iterator<Item = &MetroDefinition> {
        self.metros.values()
    }

    /// All metro codes sorted ascending
    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        self.metros.keys().cloned().collect()
    }

    /// One row per member county, in code then county order
    #[must_use]
    pub fn rows(&self) -> Vec<MsaDefinitionRow> {
        self.metros
            .values()
            .flat_map(|metro| {
                metro.counties.iter().map(|county| MsaDefinitionRow {
                    code: metro.code.clone(),
                    title: metro.title.clone(),
                    stcofips: county.clone(),
                })
            })
            .collect()
    }
}

impl ArrowTable for MetroRegistry {
    fn to_record_batch(&self) -> Result<RecordBatch> {
        let fields = Vec::<FieldRef>::from_type::<MsaDefinitionRow>(TracingOptions::default())?;
        Ok(serde_arrow::to_record_batch(&fields, &self.rows())?)
    }

    /// Codes may be stored as strings or integers, so columns are read by
    /// casting rather than through serde
    fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let codes = string_column(batch, CODE_COLUMN)?;
        let titles = string_column(batch, TITLE_COLUMN)?;
        let counties = string_column(batch, COUNTY_COLUMN)?;
        Ok(Self::from_rows(
            codes
                .into_iter()
                .zip(titles)
                .zip(counties)
                .map(|((code, title), stcofips)| MsaDefinitionRow {
                    code,
                    title,
                    stcofips,
                }),
        ))
    }
}
