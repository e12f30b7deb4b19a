//! Collapsing ACS income brackets into income groups

use std::collections::BTreeSet;

use arrow::array::BooleanArray;
use arrow::compute::filter_record_batch;
use arrow::record_batch::RecordBatch;

use crate::error::Result;
use crate::models::income::{BRACKET_COLUMNS, IncomeGroupRecord, TOTAL_COLUMN};
use crate::utils::io::parquet::{f64_column, string_column};

/// Column of the raw ACS geography identifier
pub const GEOID_COLUMN: &str = "GEOID";

/// Length of the summary level prefix of a raw ACS identifier
/// (`15000US` for block groups)
pub const GEOID_PREFIX_LEN: usize = 7;

/// Block-group geoid of a raw ACS identifier
#[must_use]
pub fn block_group_geoid(raw: &str) -> &str {
    raw.get(GEOID_PREFIX_LEN..).unwrap_or_default()
}

/// Keep the rows of an ACS table that fall in one of the given counties
pub fn filter_counties(batch: &RecordBatch, counties: &BTreeSet<String>) -> Result<RecordBatch> {
    let geoids = string_column(batch, GEOID_COLUMN)?;
    let mask: BooleanArray = geoids
        .iter()
        .map(|raw| {
            let geoid = block_group_geoid(raw);
            Some(geoid.get(..5).is_some_and(|county| counties.contains(county)))
        })
        .collect();
    Ok(filter_record_batch(batch, &mask)?)
}

/// Income group records for every row of an ACS bracket table
///
/// Bracket and total columns may have any numeric type. A null bracket counts
/// as 0 in its group sum, so a row with some null brackets still gets the sum
/// of its remaining brackets rather than a missing value.
pub fn group_incomes(batch: &RecordBatch, year: i32) -> Result<Vec<IncomeGroupRecord>> {
    let geoids = string_column(batch, GEOID_COLUMN)?;
    let totals = f64_column(batch, TOTAL_COLUMN, 0.0)?;
    let brackets = BRACKET_COLUMNS
        .iter()
        .map(|column| f64_column(batch, column, 0.0))
        .collect::<Result<Vec<_>>>()?;

    Ok(geoids
        .iter()
        .zip(totals)
        .enumerate()
        .map(|(row, (raw, total))| {
            let counts: [f64; 16] = std::array::from_fn(|b| brackets[b][row]);
            IncomeGroupRecord::from_brackets(
                block_group_geoid(raw).to_string(),
                year,
                total,
                &counts,
            )
        })
        .collect())
}
