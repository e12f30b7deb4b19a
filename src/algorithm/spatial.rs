//! Spatial context of a metro: unit centroids, areas, contiguity and
//! distance based weights
//!
//! All lengths are in the units of the projected CRS (metres for UTM).

use geo::{Area, Centroid};
use geo_types::{Coord, MultiPolygon};
use rayon::prelude::*;

use crate::algorithm::connectivity::{Contiguity, ContiguityGraph};
use crate::error::{IncsegError, Result};

/// Units farther apart than this contribute nothing to negative exponential
/// decay weights (exp(-25) is below 1.4e-11)
pub const DECAY_CUTOFF_KM: f64 = 25.0;

/// Centroid and area of one unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitGeometry {
    pub centroid: Coord<f64>,
    pub area: f64,
}

/// Geometry derived data shared by every year of a metro dataset
#[derive(Debug, Clone)]
pub struct SpatialContext {
    units: Vec<UnitGeometry>,
    contiguity: ContiguityGraph,
}

impl SpatialContext {
    /// Derive centroids, areas and contiguity from projected geometries
    pub fn from_geometries(geometries: &[MultiPolygon<f64>], rule: Contiguity) -> Result<Self> {
        let units = geometries
            .iter()
            .enumerate()
            .map(|(i, geometry)| {
                let centroid = geometry.centroid().ok_or_else(|| {
                    IncsegError::Geometry(format!("Unit {i} has an empty geometry"))
                })?;
                Ok(UnitGeometry {
                    centroid: centroid.0,
                    area: geometry.unsigned_area(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            units,
            contiguity: ContiguityGraph::build(geometries, rule),
        })
    }

    /// Build a context from precomputed parts
    #[must_use]
    pub fn from_parts(units: Vec<UnitGeometry>, contiguity: ContiguityGraph) -> Self {
        Self { units, contiguity }
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
    pub fn unit(&self, index: usize) -> &UnitGeometry {
        &self.units[index]
    }

    #[must_use]
    pub fn contiguity(&self) -> &ContiguityGraph {
        &self.contiguity
    }

    /// Euclidean distance between two unit centroids
    #[must_use]
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        let (p, q) = (self.units[a].centroid, self.units[b].centroid);
        (p.x - q.x).hypot(p.y - q.y)
    }

    /// Pairs of units (by position in `units`) whose centroids are closer
    /// than `radius`, including each unit with itself at distance 0
    #[must_use]
    pub fn pairs_within(&self, units: &[usize], radius: f64) -> Vec<Vec<(usize, f64)>> {
        let mut order: Vec<usize> = (0..units.len()).collect();
        order.sort_by(|&a, &b| {
            self.units[units[a]]
                .centroid
                .x
                .total_cmp(&self.units[units[b]].centroid.x)
        });
        let xs: Vec<f64> = order
            .iter()
            .map(|&pos| self.units[units[pos]].centroid.x)
            .collect();

        let mut rows: Vec<(usize, Vec<(usize, f64)>)> = order
            .par_iter()
            .enumerate()
            .map(|(rank, &pos)| {
                let x = xs[rank];
                let lo = xs.partition_point(|&v| v < x - radius);
                let hi = xs.partition_point(|&v| v <= x + radius);
                let row = (lo..hi)
                    .filter_map(|other_rank| {
                        let other = order[other_rank];
                        let d = self.distance(units[pos], units[other]);
                        (d < radius || other == pos).then_some((other, d))
                    })
                    .collect();
                (pos, row)
            })
            .collect();
        rows.sort_by_key(|(pos, _)| *pos);
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

/// Sparse row weights over the units of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SparseWeights {
    rows: Vec<Vec<(usize, f64)>>,
}

impl SparseWeights {
    /// Triangular kernel `1 - d / bandwidth` inside the bandwidth with a
    /// self weight of 1
    #[must_use]
    pub fn triangular(ctx: &SpatialContext, units: &[usize], bandwidth: f64) -> Self {
        let rows = ctx
            .pairs_within(units, bandwidth)
            .into_iter()
            .enumerate()
            .map(|(pos, pairs)| {
                pairs
                    .into_iter()
                    .map(|(other, d)| {
                        let w = if other == pos { 1.0 } else { 1.0 - d / bandwidth };
                        (other, w)
                    })
                    .filter(|(_, w)| *w > 0.0)
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Negative exponential decay `exp(-d)` with `d` in kilometres. The
    /// self distance of a unit is `sqrt(0.6 * area)`.
    #[must_use]
    pub fn exponential_decay(ctx: &SpatialContext, units: &[usize]) -> Self {
        let rows = ctx
            .pairs_within(units, DECAY_CUTOFF_KM * 1000.0)
            .into_iter()
            .enumerate()
            .map(|(pos, pairs)| {
                pairs
                    .into_iter()
                    .map(|(other, d)| {
                        let km = if other == pos {
                            (0.6 * ctx.unit(units[pos]).area).sqrt() / 1000.0
                        } else {
                            d / 1000.0
                        };
                        (other, (-km).exp())
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-zero entries of one row
    #[must_use]
    pub fn row(&self, pos: usize) -> &[(usize, f64)] {
        &self.rows[pos]
    }

    /// Spatial lag: weighted sum of `values` over each row
    #[must_use]
    pub fn lag(&self, values: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(j, w)| w * values[j]).sum())
            .collect()
    }

    /// Sum of every weight
    #[must_use]
    pub fn total(&self) -> f64 {
        self.rows.iter().flatten().map(|(_, w)| w).sum()
    }
}
