//! Tract-level median household income for the dashboard map

use std::collections::BTreeSet;
use std::path::Path;

use geo_types::MultiPolygon;

use crate::error::Result;
use crate::models::dataset::{GEOMETRY_COLUMN, parse_polygonal};
use crate::utils::io::parquet::{f64_column, read_parquet_table, string_column};

/// Column of the tract identifier
pub const TRACT_ID_COLUMN: &str = "geoid";
/// Column of the tract median household income
pub const MEDIAN_INCOME_COLUMN: &str = "median_household_income";

/// One tract polygon with its median household income
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    pub geoid: String,
    pub median_income: f64,
    /// Longitude/latitude polygon
    pub geometry: MultiPolygon<f64>,
}

/// Tracts of one metro in one year
#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    pub year: i32,
    pub features: Vec<MapFeature>,
}

impl MapLayer {
    /// Load the tracts of the given counties, dropping tracts without an
    /// income value
    pub fn load(path: &Path, year: i32, counties: &BTreeSet<String>) -> Result<Self> {
        let batch = read_parquet_table(
            path,
            Some(&[TRACT_ID_COLUMN, MEDIAN_INCOME_COLUMN, GEOMETRY_COLUMN][..]),
        )?;
        let geoids = string_column(&batch, TRACT_ID_COLUMN)?;
        let incomes = f64_column(&batch, MEDIAN_INCOME_COLUMN, f64::NAN)?;
        let wkt = string_column(&batch, GEOMETRY_COLUMN)?;

        let features = geoids
            .into_iter()
            .zip(incomes)
            .zip(wkt)
            .filter(|((geoid, income), _)| {
                income.is_finite() && geoid.get(..5).is_some_and(|county| counties.contains(county))
            })
            .map(|((geoid, median_income), text)| {
                Ok(MapFeature {
                    geoid,
                    median_income,
                    geometry: parse_polygonal(&text)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("Map layer {year}: {} tracts in {} counties", features.len(), counties.len());
        Ok(Self { year, features })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
