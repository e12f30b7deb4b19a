//! Per-metro dataset builder
//!
//! Loads the ACS bracket table of every configured year, keeps the block
//! groups of the metro's counties, joins them to their polygons and projects
//! the result to a UTM zone estimated from the data.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use itertools::Itertools;

use crate::algorithm::connectivity::{Contiguity, largest_component};
use crate::algorithm::grouping::{GEOID_COLUMN, filter_counties, group_incomes};
use crate::algorithm::projection::UtmZone;
use crate::config::{AnalysisConfig, PathConfig};
use crate::error::{IncsegError, Result};
use crate::models::dataset::{BlockGroup, DatasetRow, GEOMETRY_COLUMN, MetroDataset, parse_polygonal};
use crate::models::income::{BRACKET_COLUMNS, IncomeGroupRecord, TOTAL_COLUMN};
use crate::registry::MetroRegistry;
use crate::utils::io::parquet::{read_parquet_table, string_column};

/// Column of the block-group identifier in the geometry table
pub const BLOCK_GROUP_ID_COLUMN: &str = "geoid";

/// Block-group polygons in longitude/latitude, in table order
#[derive(Debug, Clone, Default)]
pub struct BlockGroupLayer {
    block_groups: Vec<BlockGroup>,
}

impl BlockGroupLayer {
    /// Load a table with a `geoid` column and a WKT `geometry` column
    pub fn load(path: &Path) -> Result<Self> {
        let batch = read_parquet_table(path, Some(&[BLOCK_GROUP_ID_COLUMN, GEOMETRY_COLUMN][..]))?;
        let geoids = string_column(&batch, BLOCK_GROUP_ID_COLUMN)?;
        let wkt = string_column(&batch, GEOMETRY_COLUMN)?;

        let block_groups = geoids
            .into_iter()
            .zip(wkt)
            .map(|(geoid, text)| {
                let geometry = parse_polygonal(&text).map_err(|e| {
                    IncsegError::Geometry(format!("Block group {geoid}: {e}"))
                })?;
                Ok(BlockGroup { geoid, geometry })
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "Loaded {} block-group geometries from {}",
            block_groups.len(),
            path.display()
        );
        Ok(Self { block_groups })
    }

    #[must_use]
    pub fn from_block_groups(block_groups: Vec<BlockGroup>) -> Self {
        Self { block_groups }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.block_groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.block_groups.is_empty()
    }
}

/// Read one year of ACS brackets and group the rows of the given counties
fn load_year(path: &Path, year: i32, counties: &BTreeSet<String>) -> Result<Vec<IncomeGroupRecord>> {
    let columns: Vec<&str> = [GEOID_COLUMN, TOTAL_COLUMN]
        .into_iter()
        .chain(BRACKET_COLUMNS)
        .collect();
    let table = read_parquet_table(path, Some(columns.as_slice()))?;
    let metro_rows = filter_counties(&table, counties)?;
    let records = group_incomes(&metro_rows, year)?;
    log::debug!("{year}: {} block groups in {} counties", records.len(), counties.len());
    Ok(records)
}

/// Builds [`MetroDataset`]s from explicitly loaded inputs
#[derive(Debug, Clone)]
pub struct DatasetBuilder<'a> {
    paths: &'a PathConfig,
    analysis: &'a AnalysisConfig,
    registry: &'a MetroRegistry,
    block_groups: &'a BlockGroupLayer,
}

impl<'a> DatasetBuilder<'a> {
    #[must_use]
    pub fn new(
        paths: &'a PathConfig,
        analysis: &'a AnalysisConfig,
        registry: &'a MetroRegistry,
        block_groups: &'a BlockGroupLayer,
    ) -> Self {
        Self {
            paths,
            analysis,
            registry,
            block_groups,
        }
    }

    /// Contiguity rule used for the connectivity filter
    #[must_use]
    pub fn contiguity(&self) -> Contiguity {
        self.analysis.contiguity
    }

    /// Build the projected multi-year dataset of a metro
    pub fn generate_dataset(&self, metro: &str) -> Result<MetroDataset> {
        let counties = self.registry.counties(metro)?;
        let mut records = Vec::new();
        for year in self.analysis.years() {
            records.extend(load_year(&self.paths.acs_path(year), year, counties)?);
        }
        self.assemble(metro, records)
    }

    /// Same as [`Self::generate_dataset`], with the year tables read
    /// concurrently on blocking tasks
    pub async fn generate_dataset_async(&self, metro: &str) -> Result<MetroDataset> {
        let counties = Arc::new(self.registry.counties(metro)?.clone());
        let tasks = self.analysis.years().into_iter().map(|year| {
            let path: PathBuf = self.paths.acs_path(year);
            let counties = Arc::clone(&counties);
            tokio::task::spawn_blocking(move || load_year(&path, year, &counties))
        });

        let per_year = futures::future::try_join_all(tasks)
            .await
            .map_err(|e| IncsegError::Task(format!("Loading ACS tables for {metro}: {e}")))?;
        let records = per_year
            .into_iter()
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        self.assemble(metro, records)
    }

    /// Build the dataset and keep only the largest contiguous component
    pub fn generate_dataset_with_island_handling(&self, metro: &str) -> Result<MetroDataset> {
        let mut dataset = self.generate_dataset(metro)?;
        let keep = largest_component(&dataset.geometries(), self.analysis.contiguity);
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped > 0 {
            log::info!(
                "Metro {metro}: dropping {dropped} of {} block groups outside the largest component",
                keep.len()
            );
        }
        dataset.retain_units(&keep);
        Ok(dataset)
    }

    /// Inner join records to block groups and project the geometries
    fn assemble(&self, metro: &str, records: Vec<IncomeGroupRecord>) -> Result<MetroDataset> {
        let present: HashSet<&str> = records.iter().map(|r| r.geoid.as_str()).collect();
        let matched: Vec<&BlockGroup> = self
            .block_groups
            .block_groups
            .iter()
            .filter(|bg| present.contains(bg.geoid.as_str()))
            .unique_by(|bg| bg.geoid.clone())
            .collect();
        if matched.is_empty() {
            return Err(IncsegError::EmptyDataset(metro.to_string()));
        }

        let crs = UtmZone::estimate_for(matched.iter().map(|bg| &bg.geometry))?;
        let unit_of: HashMap<&str, usize> = matched
            .iter()
            .enumerate()
            .map(|(unit, bg)| (bg.geoid.as_str(), unit))
            .collect();

        let rows: Vec<DatasetRow> = records
            .iter()
            .filter_map(|record| {
                let unit = *unit_of.get(record.geoid.as_str())?;
                Some(DatasetRow {
                    unit,
                    record: record.clone(),
                })
            })
            .collect();
        let units = matched
            .iter()
            .map(|bg| BlockGroup {
                geoid: bg.geoid.clone(),
                geometry: crs.project_geometry(&bg.geometry),
            })
            .collect::<Vec<_>>();

        let unmatched = records.len() - rows.len();
        if unmatched > 0 {
            log::warn!("Metro {metro}: {unmatched} income rows have no block-group geometry");
        }
        log::info!(
            "Metro {metro}: {} rows over {} block groups, projected to {crs}",
            rows.len(),
            units.len()
        );

        Ok(MetroDataset {
            metro: metro.to_string(),
            crs,
            units,
            rows,
        })
    }
}
