//! Seeded synthetic input data
//!
//! Writes ACS bracket tables, block-group geometries, tract map layers and a
//! metro registry with the same layout as the real inputs. Each metro is a
//! grid of square block groups about 1 km wide, with income rising from west
//! to east, plus optional island block groups that touch nothing.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use geo_types::{MultiPolygon, polygon};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wkt::ToWkt;

use crate::algorithm::grouping::GEOID_COLUMN;
use crate::config::PathConfig;
use crate::error::Result;
use crate::error::util::create_dir_all;
use crate::models::ArrowTable;
use crate::models::dataset::GEOMETRY_COLUMN;
use crate::models::income::{BRACKET_COLUMNS, TOTAL_COLUMN};
use crate::models::map::MEDIAN_INCOME_COLUMN;
use crate::pipeline::builder::BLOCK_GROUP_ID_COLUMN;
use crate::registry::{MetroDefinition, MetroRegistry};
use crate::utils::io::parquet::write_parquet;

/// Width of a synthetic block group in degrees
pub const CELL_DEGREES: f64 = 0.01;
/// ACS summary level prefix of block-group identifiers
const ACS_PREFIX: &str = "15000US";

/// A synthetic metro laid out as a grid
#[derive(Debug, Clone)]
pub struct SyntheticMetro {
    pub code: String,
    pub title: String,
    /// Five-digit county FIPS codes. Grid columns are split evenly between them.
    pub counties: Vec<String>,
    pub cols: usize,
    pub rows: usize,
    /// Isolated block groups east of the grid
    pub islands: usize,
    /// South-west corner in longitude/latitude
    pub origin: (f64, f64),
}

impl SyntheticMetro {
    fn cells(&self) -> Vec<Cell> {
        let grid = (0..self.rows).flat_map(|row| {
            (0..self.cols).map(move |col| Cell {
                col: col as f64,
                row: row as f64,
                gradient: col as f64 / (self.cols.max(2) - 1) as f64,
            })
        });
        let islands = (0..self.islands).map(|i| Cell {
            col: (self.cols + 2 + 2 * i) as f64,
            row: 0.0,
            gradient: 0.5,
        });
        grid.chain(islands).collect()
    }

    fn county_of(&self, cell: usize) -> &str {
        let col = cell % self.cols.max(1);
        let county = (col * self.counties.len() / self.cols.max(1)).min(self.counties.len() - 1);
        &self.counties[county]
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    col: f64,
    row: f64,
    /// 0 in the poorest column, 1 in the richest
    gradient: f64,
}

/// A block group of the generated data
#[derive(Debug, Clone)]
struct SyntheticBlockGroup {
    geoid: String,
    geometry: MultiPolygon<f64>,
    gradient: f64,
}

/// Synthetic inputs for a set of metros and years
#[derive(Debug, Clone)]
pub struct SyntheticData {
    pub metros: Vec<SyntheticMetro>,
    pub years: Vec<i32>,
    /// Block groups written to the inputs but belonging to no metro
    pub outside_block_groups: usize,
    pub seed: u64,
}

impl SyntheticData {
    /// Two metros in southern California, the second with two islands
    #[must_use]
    pub fn demo(seed: u64) -> Self {
        Self {
            metros: vec![
                SyntheticMetro {
                    code: "31080".to_string(),
                    title: "Los Angeles-Long Beach-Anaheim, CA".to_string(),
                    counties: vec!["06037".to_string(), "06059".to_string()],
                    cols: 8,
                    rows: 6,
                    islands: 0,
                    origin: (-118.4, 33.9),
                },
                SyntheticMetro {
                    code: "41740".to_string(),
                    title: "San Diego-Chula Vista-Carlsbad, CA".to_string(),
                    counties: vec!["06073".to_string()],
                    cols: 6,
                    rows: 5,
                    islands: 2,
                    origin: (-117.2, 32.7),
                },
            ],
            years: (2012..=2018).collect(),
            outside_block_groups: 4,
            seed,
        }
    }

    /// A single metro of `size` block groups in a row over the given years
    #[must_use]
    pub fn single(code: &str, size: usize, islands: usize, years: Vec<i32>, seed: u64) -> Self {
        Self {
            metros: vec![SyntheticMetro {
                code: code.to_string(),
                title: format!("Metro {code}"),
                counties: vec!["99001".to_string()],
                cols: size,
                rows: 1,
                islands,
                origin: (-117.5, 34.0),
            }],
            years,
            outside_block_groups: 2,
            seed,
        }
    }

    /// The registry of the generated metros
    #[must_use]
    pub fn registry(&self) -> MetroRegistry {
        MetroRegistry::from_definitions(self.metros.iter().map(|metro| MetroDefinition {
            code: metro.code.clone(),
            title: metro.title.clone(),
            counties: metro.counties.iter().cloned().collect(),
        }))
    }

    fn block_groups(&self) -> Vec<SyntheticBlockGroup> {
        let mut block_groups = Vec::new();
        for metro in &self.metros {
            for (i, cell) in metro.cells().into_iter().enumerate() {
                block_groups.push(SyntheticBlockGroup {
                    geoid: geoid(metro.county_of(i), i),
                    geometry: square(metro.origin, cell),
                    gradient: cell.gradient,
                });
            }
        }
        // A county that no metro claims, north of everything else
        for i in 0..self.outside_block_groups {
            let cell = Cell {
                col: i as f64,
                row: 0.0,
                gradient: 0.5,
            };
            block_groups.push(SyntheticBlockGroup {
                geoid: geoid("98001", i),
                geometry: square((-117.5, 36.0), cell),
                gradient: cell.gradient,
            });
        }
        block_groups
    }

    /// Write every input table under the locations of `paths`
    ///
    /// Returns the number of block groups written.
    pub fn write(&self, paths: &PathConfig) -> Result<usize> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let block_groups = self.block_groups();

        write_table(&paths.block_groups_path(), &geometry_batch(&block_groups, None)?)?;
        let registry_path = paths.registry_path();
        ensure_parent(&registry_path)?;
        self.registry().write_parquet(&registry_path)?;

        for (step, &year) in self.years.iter().enumerate() {
            // Incomes drift upward over time
            let drift = step as f64 * 0.05;
            let affluence: Vec<f64> = block_groups
                .iter()
                .map(|bg| (bg.gradient - 0.5) * 3.0 + drift + rng.random_range(-0.3..0.3))
                .collect();
            let households: Vec<i64> = block_groups
                .iter()
                .map(|_| rng.random_range(40..400))
                .collect();

            write_table(
                &paths.acs_path(year),
                &acs_batch(&block_groups, &affluence, &households, &mut rng)?,
            )?;
            let median: Vec<f64> = affluence
                .iter()
                .map(|a| (55_000.0 * (a * 0.5).exp()).round())
                .collect();
            write_table(&paths.tract_path(year), &geometry_batch(&block_groups, Some(&median))?)?;
        }

        log::info!(
            "Wrote synthetic inputs for {} metros, {} block groups, {} years",
            self.metros.len(),
            block_groups.len(),
            self.years.len()
        );
        Ok(block_groups.len())
    }
}

fn geoid(county: &str, index: usize) -> String {
    format!("{county}{:06}{}", 100 + index / 4, index % 4 + 1)
}

fn square(origin: (f64, f64), cell: Cell) -> MultiPolygon<f64> {
    let x = origin.0 + cell.col * CELL_DEGREES;
    let y = origin.1 + cell.row * CELL_DEGREES;
    MultiPolygon(vec![polygon![
        (x: x, y: y),
        (x: x + CELL_DEGREES, y: y),
        (x: x + CELL_DEGREES, y: y + CELL_DEGREES),
        (x: x, y: y + CELL_DEGREES),
    ]])
}

/// Split `total` over the sixteen brackets, skewed toward the top brackets
/// when `affluence` is positive. Empty brackets are sometimes left null.
fn brackets(total: i64, affluence: f64, rng: &mut StdRng) -> [Option<i64>; 16] {
    let weights: [f64; 16] = std::array::from_fn(|b| (affluence * (b as f64 - 7.5) / 7.5).exp());
    let sum: f64 = weights.iter().sum();
    let mut counts: [i64; 16] = weights.map(|w| (total as f64 * w / sum).floor() as i64);
    let remainder = total - counts.iter().sum::<i64>();
    let top = if affluence >= 0.0 { 15 } else { 0 };
    counts[top] += remainder;
    counts.map(|count| {
        if count == 0 && rng.random_bool(0.5) {
            None
        } else {
            Some(count)
        }
    })
}

fn acs_batch(
    block_groups: &[SyntheticBlockGroup],
    affluence: &[f64],
    households: &[i64],
    rng: &mut StdRng,
) -> Result<RecordBatch> {
    let rows: Vec<[Option<i64>; 16]> = households
        .iter()
        .zip(affluence)
        .map(|(&total, &a)| brackets(total, a, rng))
        .collect();

    let mut fields = vec![
        Field::new(GEOID_COLUMN, DataType::Utf8, false),
        Field::new(TOTAL_COLUMN, DataType::Int64, true),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            block_groups.iter().map(|bg| format!("{ACS_PREFIX}{}", bg.geoid)),
        )),
        Arc::new(Int64Array::from(households.to_vec())),
    ];
    for (b, name) in BRACKET_COLUMNS.iter().enumerate() {
        fields.push(Field::new(*name, DataType::Int64, true));
        columns.push(Arc::new(Int64Array::from(
            rows.iter().map(|row| row[b]).collect::<Vec<_>>(),
        )));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// `geoid` and WKT `geometry`, plus the median income column when given
fn geometry_batch(block_groups: &[SyntheticBlockGroup], median: Option<&[f64]>) -> Result<RecordBatch> {
    let mut fields = vec![
        Field::new(BLOCK_GROUP_ID_COLUMN, DataType::Utf8, false),
        Field::new(GEOMETRY_COLUMN, DataType::Utf8, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            block_groups.iter().map(|bg| bg.geoid.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            block_groups.iter().map(|bg| bg.geometry.wkt_string()),
        )),
    ];
    if let Some(median) = median {
        fields.push(Field::new(MEDIAN_INCOME_COLUMN, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(median.to_vec())));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir_all(parent),
        _ => Ok(()),
    }
}

fn write_table(path: &Path, batch: &RecordBatch) -> Result<()> {
    ensure_parent(path)?;
    write_parquet(path, batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brackets_sum_to_total() {
        let mut rng = StdRng::seed_from_u64(7);
        for affluence in [-1.5, 0.0, 1.5] {
            let counts = brackets(250, affluence, &mut rng);
            assert_eq!(counts.iter().flatten().sum::<i64>(), 250);
        }
        let rich = brackets(1000, 1.5, &mut rng);
        let poor = brackets(1000, -1.5, &mut rng);
        assert!(rich[15].unwrap_or(0) > poor[15].unwrap_or(0));
    }

    #[test]
    fn test_geoids_are_unique() {
        let data = SyntheticData::demo(1);
        let block_groups = data.block_groups();
        let unique: std::collections::HashSet<_> = block_groups.iter().map(|bg| &bg.geoid).collect();
        assert_eq!(unique.len(), block_groups.len());
        assert!(block_groups.iter().all(|bg| bg.geoid.len() == 12));
        assert_eq!(block_groups.len(), 48 + 32 + 4);
    }

    #[test]
    fn test_counties_split_columns() {
        let metro = &SyntheticData::demo(1).metros[0];
        assert_eq!(metro.county_of(0), "06037");
        assert_eq!(metro.county_of(7), "06059");
        assert_eq!(metro.county_of(8), "06037");
    }
}
