//! Per-metro time series dataset
//!
//! Income group records of every year joined to the projected block-group
//! polygons. Each unique block group is stored once and rows point at it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use geo_types::{Geometry, MultiPolygon};
use serde_arrow::schema::{SchemaLike, TracingOptions};
use wkt::{ToWkt, TryFromWkt};

use crate::algorithm::projection::UtmZone;
use crate::error::{IncsegError, Result};
use crate::models::ArrowTable;
use crate::models::income::IncomeGroupRecord;
use crate::utils::io::parquet::{string_column, with_metadata};

/// Column holding WKT geometries
pub const GEOMETRY_COLUMN: &str = "geometry";
/// Schema metadata key holding the CRS of the geometries
pub const CRS_METADATA_KEY: &str = "crs";
/// Schema metadata key holding the metro code
pub const METRO_METADATA_KEY: &str = "metro";

/// A block group polygon
#[derive(Debug, Clone, PartialEq)]
pub struct BlockGroup {
    pub geoid: String,
    pub geometry: MultiPolygon<f64>,
}

/// One (block group, year) observation
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// Index into [`MetroDataset::units`]
    pub unit: usize,
    pub record: IncomeGroupRecord,
}

/// Income groups of one metro across years, with projected geometry
#[derive(Debug, Clone, PartialEq)]
pub struct MetroDataset {
    pub metro: String,
    pub crs: UtmZone,
    pub units: Vec<BlockGroup>,
    pub rows: Vec<DatasetRow>,
}

impl MetroDataset {
    /// Number of (block group, year) rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct years, ascending
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        self.rows
            .iter()
            .map(|row| row.record.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn rows_for_year(&self, year: i32) -> impl Iterator<Item = &DatasetRow> {
        self.rows.iter().filter(move |row| row.record.year == year)
    }

    /// Geometries of the unique block groups, in unit order
    #[must_use]
    pub fn geometries(&self) -> Vec<MultiPolygon<f64>> {
        self.units.iter().map(|unit| unit.geometry.clone()).collect()
    }

    /// Keep the units whose mask entry is true along with their rows
    pub fn retain_units(&mut self, keep: &[bool]) {
        let mut remap = vec![None; self.units.len()];
        let mut next = 0;
        for (old, flag) in keep.iter().enumerate() {
            if *flag {
                remap[old] = Some(next);
                next += 1;
            }
        }

        let mut flags = keep.iter();
        self.units.retain(|_| flags.next().copied().unwrap_or(false));
        self.rows.retain_mut(|row| match remap.get(row.unit).copied().flatten() {
            Some(unit) => {
                row.unit = unit;
                true
            }
            None => false,
        });
    }
}

fn record_fields() -> Result<Vec<FieldRef>> {
    Ok(Vec::<FieldRef>::from_type::<IncomeGroupRecord>(
        TracingOptions::default(),
    )?)
}

impl ArrowTable for MetroDataset {
    /// Income group columns, a WKT geometry column and the CRS as schema
    /// metadata
    fn to_record_batch(&self) -> Result<RecordBatch> {
        let records: Vec<&IncomeGroupRecord> = self.rows.iter().map(|row| &row.record).collect();
        let batch = serde_arrow::to_record_batch(&record_fields()?, &records)?;

        let wkt: Vec<String> = self
            .units
            .iter()
            .map(|unit| unit.geometry.wkt_string())
            .collect();
        let geometry = StringArray::from_iter_values(self.rows.iter().map(|row| &wkt[row.unit]));

        let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
        fields.push(Arc::new(Field::new(GEOMETRY_COLUMN, DataType::Utf8, false)));
        let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
        columns.push(Arc::new(geometry));

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        with_metadata(
            batch,
            [
                (CRS_METADATA_KEY.to_string(), self.crs.to_string()),
                (METRO_METADATA_KEY.to_string(), self.metro.clone()),
            ],
        )
    }

    fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let metadata = schema.metadata();
        let crs = metadata
            .get(CRS_METADATA_KEY)
            .ok_or_else(|| IncsegError::Schema("Dataset has no crs metadata".to_string()))?
            .parse::<UtmZone>()?;
        let metro = metadata.get(METRO_METADATA_KEY).cloned().unwrap_or_default();

        let records: Vec<IncomeGroupRecord> = serde_arrow::from_record_batch(batch)?;
        let wkt = string_column(batch, GEOMETRY_COLUMN)?;

        let mut lookup: HashMap<String, usize> = HashMap::new();
        let mut units = Vec::new();
        let mut rows = Vec::with_capacity(records.len());
        for (record, text) in records.into_iter().zip(wkt) {
            let unit = match lookup.get(&record.geoid) {
                Some(&unit) => unit,
                None => {
                    units.push(BlockGroup {
                        geoid: record.geoid.clone(),
                        geometry: parse_polygonal(&text)?,
                    });
                    lookup.insert(record.geoid.clone(), units.len() - 1);
                    units.len() - 1
                }
            };
            rows.push(DatasetRow { unit, record });
        }

        Ok(Self {
            metro,
            crs,
            units,
            rows,
        })
    }
}

/// Parse a WKT polygon or multipolygon
pub fn parse_polygonal(text: &str) -> Result<MultiPolygon<f64>> {
    let geometry = Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|e| IncsegError::Geometry(format!("Invalid WKT: {e}")))?;
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        _ => Err(IncsegError::Geometry(
            "Expected a POLYGON or MULTIPOLYGON geometry".to_string(),
        )),
    }
}
