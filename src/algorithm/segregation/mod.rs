//! Segregation indices
//!
//! A [`Frame`] holds the group counts of one year for the units of a metro
//! that have at least one household. Single-group indices measure one
//! income group against everybody else, multi-group indices look at all
//! five groups at once.

pub mod dynamics;
pub mod multigroup;
pub mod singlegroup;

use std::sync::OnceLock;

use crate::algorithm::spatial::{SparseWeights, SpatialContext};
use crate::models::dataset::MetroDataset;
use crate::models::income::IncomeGroup;

pub use dynamics::{multigroup_tempdyn, singlegroup_tempdyn, spacetime_dyn};
pub use multigroup::MultiGroupIndex;
pub use singlegroup::SingleGroupIndex;

/// Group counts and totals of one year
#[derive(Debug)]
pub struct Frame<'a> {
    ctx: &'a SpatialContext,
    units: Vec<usize>,
    groups: Vec<[f64; 5]>,
    totals: Vec<f64>,
    decay: OnceLock<SparseWeights>,
}

impl<'a> Frame<'a> {
    /// Build a frame from `(unit, group counts, total)` entries. Entries
    /// without households are dropped.
    pub fn new(
        ctx: &'a SpatialContext,
        entries: impl IntoIterator<Item = (usize, [f64; 5], f64)>,
    ) -> Self {
        let mut units = Vec::new();
        let mut groups = Vec::new();
        let mut totals = Vec::new();
        for (unit, counts, total) in entries {
            if total.is_finite() && total > 0.0 {
                units.push(unit);
                groups.push(counts);
                totals.push(total);
            }
        }
        Self {
            ctx,
            units,
            groups,
            totals,
            decay: OnceLock::new(),
        }
    }

    /// Frame of one year of a metro dataset
    pub fn for_year(dataset: &MetroDataset, ctx: &'a SpatialContext, year: i32) -> Self {
        Self::new(
            ctx,
            dataset
                .rows_for_year(year)
                .map(|row| (row.unit, row.record.counts(), row.record.total)),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    #[must_use]
    pub fn ctx(&self) -> &'a SpatialContext {
        self.ctx
    }

    /// Unit index in the spatial context for each frame position
    #[must_use]
    pub fn units(&self) -> &[usize] {
        &self.units
    }

    #[must_use]
    pub fn totals(&self) -> &[f64] {
        &self.totals
    }

    /// Counts of all five groups per unit
    #[must_use]
    pub fn groups(&self) -> &[[f64; 5]] {
        &self.groups
    }

    /// Counts of one group per unit
    #[must_use]
    pub fn group(&self, group: IncomeGroup) -> Vec<f64> {
        self.groups.iter().map(|counts| counts[group.index()]).collect()
    }

    /// Areas of the frame units
    #[must_use]
    pub fn areas(&self) -> Vec<f64> {
        self.units.iter().map(|&unit| self.ctx.unit(unit).area).collect()
    }

    /// Negative exponential decay weights, computed on first use
    pub fn decay(&self) -> &SparseWeights {
        self.decay
            .get_or_init(|| SparseWeights::exponential_decay(self.ctx, &self.units))
    }

    /// Frame with every count replaced by its triangular kernel lag at the
    /// given bandwidth
    #[must_use]
    pub fn lagged(&self, bandwidth: f64) -> Self {
        let weights = SparseWeights::triangular(self.ctx, &self.units, bandwidth);
        let columns = IncomeGroup::ALL.map(|group| weights.lag(&self.group(group)));
        let groups = (0..self.len())
            .map(|pos| std::array::from_fn(|m| columns[m][pos]))
            .collect();

        Self {
            ctx: self.ctx,
            units: self.units.clone(),
            groups,
            totals: weights.lag(&self.totals),
            decay: OnceLock::new(),
        }
    }
}

/// `count / total` with zero totals mapped to zero
pub(crate) fn proportion(count: f64, total: f64) -> f64 {
    if total > 0.0 { count / total } else { 0.0 }
}

/// `-p ln p` with the convention `0 ln 0 = 0`
pub(crate) fn entropy_term(p: f64) -> f64 {
    if p > 0.0 { -p * p.ln() } else { 0.0 }
}

/// Sum over all ordered pairs of `w_i w_j |p_i - p_j|`, in O(n log n)
pub(crate) fn weighted_pair_spread(values: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let mut pairs: Vec<(f64, f64)> = values.into_iter().collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (mut cum_weight, mut cum_weighted, mut half) = (0.0, 0.0, 0.0);
    for (p, w) in pairs {
        half += w * (p * cum_weight - cum_weighted);
        cum_weight += w;
        cum_weighted += w * p;
    }
    2.0 * half
}

#[cfg(test)]
pub(crate) mod test_support {
    use geo_types::Coord;

    use crate::algorithm::connectivity::{ContiguityGraph, Neighbors};
    use crate::algorithm::spatial::{SpatialContext, UnitGeometry};

    /// A row of `n` unit squares of 1 km², each contiguous with the next
    pub fn strip(n: usize) -> SpatialContext {
        let units = (0..n)
            .map(|i| UnitGeometry {
                centroid: Coord {
                    x: i as f64 * 1_000.0,
                    y: 0.0,
                },
                area: 1_000_000.0,
            })
            .collect();
        let neighbors = (0..n)
            .map(|i| {
                let mut list = Neighbors::new();
                if i > 0 {
                    list.push(i - 1);
                }
                if i + 1 < n {
                    list.push(i + 1);
                }
                list
            })
            .collect();
        SpatialContext::from_parts(units, ContiguityGraph::from_neighbors(neighbors))
    }
}
