//! Index result tables and the artifacts that hold them
//!
//! Index-by-year tables have one row per year and one Float64 column per
//! index. Multiscalar profiles have one row per distance band and one
//! Float64 column per year, named by the year.

use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::algorithm::segregation::SingleGroupIndex;
use crate::error::{IncsegError, Result};
use crate::models::ArrowTable;
use crate::models::income::IncomeExtreme;
use crate::utils::io::parquet::f64_column;

/// Column holding the year of an index-by-year table
pub const YEAR_COLUMN: &str = "year";
/// Column holding the bandwidth of a profile table
pub const DISTANCE_COLUMN: &str = "distance";

/// Indices with a multiscalar profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileIndex {
    Entropy,
    Isolation,
}

impl ProfileIndex {
    pub const ALL: [Self; 2] = [Self::Entropy, Self::Isolation];

    #[must_use]
    pub const fn index(self) -> SingleGroupIndex {
        match self {
            Self::Entropy => SingleGroupIndex::Entropy,
            Self::Isolation => SingleGroupIndex::Isolation,
        }
    }

    /// Lowercase label used in artifact names
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Entropy => "entropy",
            Self::Isolation => "isolation",
        }
    }
}

impl fmt::Display for ProfileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ProfileIndex {
    type Err = IncsegError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entropy" => Ok(Self::Entropy),
            "isolation" => Ok(Self::Isolation),
            other => Err(IncsegError::Config(format!(
                "Unknown profile index '{other}', expected 'entropy' or 'isolation'"
            ))),
        }
    }
}

/// A persisted table of one metro
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    IncomeData,
    Multigroup,
    Singlegroup { group: IncomeExtreme },
    Spacetime { index: ProfileIndex, group: IncomeExtreme },
}

impl Artifact {
    /// Index artifacts in the order they are computed
    pub const RESULTS: [Self; 7] = [
        Self::Multigroup,
        Self::Singlegroup { group: IncomeExtreme::High },
        Self::Singlegroup { group: IncomeExtreme::Low },
        Self::Spacetime { index: ProfileIndex::Entropy, group: IncomeExtreme::High },
        Self::Spacetime { index: ProfileIndex::Entropy, group: IncomeExtreme::Low },
        Self::Spacetime { index: ProfileIndex::Isolation, group: IncomeExtreme::High },
        Self::Spacetime { index: ProfileIndex::Isolation, group: IncomeExtreme::Low },
    ];

    /// File name without the metro prefix and extension
    #[must_use]
    pub fn stem(self) -> String {
        match self {
            Self::IncomeData => "income_data".to_string(),
            Self::Multigroup => "multigroup".to_string(),
            Self::Singlegroup { group } => format!("singlegroup_{group}"),
            Self::Spacetime { index, group } => format!("spacetime_{index}_{group}"),
        }
    }

    /// File name of the artifact for a metro
    #[must_use]
    pub fn file_name(self, metro: &str) -> String {
        format!("{metro}_{}.parquet", self.stem())
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

/// Index values by year
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTable {
    indices: Vec<String>,
    years: Vec<i32>,
    /// `values[year][index]`
    values: Vec<Vec<f64>>,
}

impl IndexTable {
    /// Build a table, checking that every row has one value per index
    pub fn new(indices: Vec<String>, years: Vec<i32>, values: Vec<Vec<f64>>) -> Result<Self> {
        if values.len() != years.len() || values.iter().any(|row| row.len() != indices.len()) {
            return Err(IncsegError::Index(format!(
                "Index table shape mismatch: {} years, {} indices",
                years.len(),
                indices.len()
            )));
        }
        Ok(Self {
            indices,
            years,
            values,
        })
    }

    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    #[must_use]
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.years.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Values of one index in year order
    #[must_use]
    pub fn series(&self, index: &str) -> Option<Vec<f64>> {
        let column = self.indices.iter().position(|name| name == index)?;
        Some(self.values.iter().map(|row| row[column]).collect())
    }

    /// Value of one index in one year
    #[must_use]
    pub fn value(&self, index: &str, year: i32) -> Option<f64> {
        let column = self.indices.iter().position(|name| name == index)?;
        let row = self.years.iter().position(|y| *y == year)?;
        Some(self.values[row][column])
    }
}

impl ArrowTable for IndexTable {
    fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(YEAR_COLUMN, DataType::Int32, false)];
        fields.extend(
            self.indices
                .iter()
                .map(|name| Field::new(name, DataType::Float64, true)),
        );

        let mut columns: Vec<ArrayRef> = vec![Arc::new(Int32Array::from(self.years.clone()))];
        columns.extend((0..self.indices.len()).map(|column| {
            Arc::new(Float64Array::from_iter_values(
                self.values.iter().map(|row| row[column]),
            )) as ArrayRef
        }));

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let years = f64_column(batch, YEAR_COLUMN, f64::NAN)?
            .into_iter()
            .map(|year| year as i32)
            .collect::<Vec<_>>();
        let indices: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .filter(|name| name != YEAR_COLUMN)
            .collect();

        let columns = indices
            .iter()
            .map(|name| f64_column(batch, name, f64::NAN))
            .collect::<Result<Vec<_>>>()?;
        let values = (0..years.len())
            .map(|row| columns.iter().map(|column| column[row]).collect())
            .collect();
        Self::new(indices, years, values)
    }
}

/// One point of a multiscalar profile in long form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub distance: u32,
    pub year: i32,
    pub value: f64,
}

/// Index values by distance band and year
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    distances: Vec<u32>,
    years: Vec<i32>,
    /// `values[distance][year]`
    values: Vec<Vec<f64>>,
}

impl ProfileTable {
    pub fn new(distances: Vec<u32>, years: Vec<i32>, values: Vec<Vec<f64>>) -> Result<Self> {
        if values.len() != distances.len() || values.iter().any(|row| row.len() != years.len()) {
            return Err(IncsegError::Index(format!(
                "Profile table shape mismatch: {} distances, {} years",
                distances.len(),
                years.len()
            )));
        }
        Ok(Self {
            distances,
            years,
            values,
        })
    }

    #[must_use]
    pub fn distances(&self) -> &[u32] {
        &self.distances
    }

    #[must_use]
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Profile of one year in distance order
    #[must_use]
    pub fn profile(&self, year: i32) -> Option<Vec<f64>> {
        let column = self.years.iter().position(|y| *y == year)?;
        Some(self.values.iter().map(|row| row[column]).collect())
    }

    /// One point per (distance, year), distances varying slowest
    #[must_use]
    pub fn long_form(&self) -> Vec<ProfilePoint> {
        self.distances
            .iter()
            .zip(&self.values)
            .flat_map(|(&distance, row)| {
                self.years
                    .iter()
                    .zip(row)
                    .map(move |(&year, &value)| ProfilePoint {
                        distance,
                        year,
                        value,
                    })
            })
            .collect()
    }

    /// Largest finite value, if any
    #[must_use]
    pub fn max_value(&self) -> Option<f64> {
        self.values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }
}

impl ArrowTable for ProfileTable {
    fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = vec![Field::new(DISTANCE_COLUMN, DataType::UInt32, false)];
        fields.extend(
            self.years
                .iter()
                .map(|year| Field::new(year.to_string(), DataType::Float64, true)),
        );

        let mut columns: Vec<ArrayRef> =
            vec![Arc::new(UInt32Array::from(self.distances.clone()))];
        columns.extend((0..self.years.len()).map(|column| {
            Arc::new(Float64Array::from_iter_values(
                self.values.iter().map(|row| row[column]),
            )) as ArrayRef
        }));

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let distances = f64_column(batch, DISTANCE_COLUMN, f64::NAN)?
            .into_iter()
            .map(|d| d as u32)
            .collect::<Vec<_>>();

        let mut years = Vec::new();
        let mut columns = Vec::new();
        for field in batch.schema().fields() {
            if field.name() == DISTANCE_COLUMN {
                continue;
            }
            let year = field.name().parse::<i32>().map_err(|_| {
                IncsegError::Schema(format!("Profile column '{}' is not a year", field.name()))
            })?;
            years.push(year);
            columns.push(f64_column(batch, field.name(), f64::NAN)?);
        }

        let values = (0..distances.len())
            .map(|row| columns.iter().map(|column| column[row]).collect())
            .collect();
        Self::new(distances, years, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names() {
        assert_eq!(Artifact::IncomeData.file_name("31080"), "31080_income_data.parquet");
        assert_eq!(
            Artifact::Singlegroup { group: IncomeExtreme::Low }.file_name("31080"),
            "31080_singlegroup_low.parquet"
        );
        assert_eq!(
            Artifact::Spacetime {
                index: ProfileIndex::Isolation,
                group: IncomeExtreme::High
            }
            .stem(),
            "spacetime_isolation_high"
        );
    }

    #[test]
    fn test_index_table_layout() {
        let table = IndexTable::new(
            vec!["Dissim".into(), "Gini".into()],
            vec![2012, 2013],
            vec![vec![0.1, 0.2], vec![0.3, f64::NAN]],
        )
        .unwrap();

        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).name(), YEAR_COLUMN);

        let restored = IndexTable::from_record_batch(&batch).unwrap();
        assert_eq!(restored.series("Dissim"), Some(vec![0.1, 0.3]));
        assert!(restored.value("Gini", 2013).unwrap().is_nan());
        assert_eq!(restored.value("Gini", 2019), None);
    }

    #[test]
    fn test_shape_is_checked() {
        assert!(IndexTable::new(vec!["Dissim".into()], vec![2012], vec![vec![]]).is_err());
        assert!(ProfileTable::new(vec![500], vec![2012, 2013], vec![vec![1.0]]).is_err());
    }

    #[test]
    fn test_profile_long_form_and_columns() {
        let table = ProfileTable::new(
            vec![500, 1000],
            vec![2012, 2018],
            vec![vec![0.4, 0.5], vec![0.3, f64::NAN]],
        )
        .unwrap();

        let long = table.long_form();
        assert_eq!(long.len(), 4);
        assert_eq!(long[1], ProfilePoint { distance: 500, year: 2018, value: 0.5 });
        assert_eq!(table.max_value(), Some(0.5));

        let batch = table.to_record_batch().unwrap();
        let names: Vec<_> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["distance", "2012", "2018"]);
        let restored = ProfileTable::from_record_batch(&batch).unwrap();
        assert_eq!(restored.profile(2012), Some(vec![0.4, 0.3]));
    }
}
