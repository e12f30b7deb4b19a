//! Single-group segregation indices
//!
//! `x` is the group count, `t` the unit total and `y = t - x` the count of
//! everybody else. Capital letters are metro totals and `P = X / T`.

use std::fmt;
use std::str::FromStr;

use geo_types::Coord;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{Frame, proportion, weighted_pair_spread};
use crate::error::{IncsegError, Result};
use crate::models::income::IncomeGroup;

/// Shape parameter of the Atkinson index
pub const ATKINSON_SHAPE: f64 = 0.5;

/// Single-group indices in the order they are tabulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SingleGroupIndex {
    Dissim,
    Gini,
    Entropy,
    Atkinson,
    Isolation,
    Interaction,
    CorrelationR,
    Delta,
    AbsoluteConcentration,
    RelativeConcentration,
    AbsoluteCentralization,
    RelativeCentralization,
    AbsoluteClustering,
    DistanceDecayIsolation,
    DistanceDecayInteraction,
    SpatialDissim,
}

impl SingleGroupIndex {
    pub const ALL: [Self; 16] = [
        Self::Dissim,
        Self::Gini,
        Self::Entropy,
        Self::Atkinson,
        Self::Isolation,
        Self::Interaction,
        Self::CorrelationR,
        Self::Delta,
        Self::AbsoluteConcentration,
        Self::RelativeConcentration,
        Self::AbsoluteCentralization,
        Self::RelativeCentralization,
        Self::AbsoluteClustering,
        Self::DistanceDecayIsolation,
        Self::DistanceDecayInteraction,
        Self::SpatialDissim,
    ];

    /// Published index name, also used as the column name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dissim => "Dissim",
            Self::Gini => "Gini",
            Self::Entropy => "Entropy",
            Self::Atkinson => "Atkinson",
            Self::Isolation => "Isolation",
            Self::Interaction => "Interaction",
            Self::CorrelationR => "CorrelationR",
            Self::Delta => "Delta",
            Self::AbsoluteConcentration => "AbsoluteConcentration",
            Self::RelativeConcentration => "RelativeConcentration",
            Self::AbsoluteCentralization => "AbsoluteCentralization",
            Self::RelativeCentralization => "RelativeCentralization",
            Self::AbsoluteClustering => "AbsoluteClustering",
            Self::DistanceDecayIsolation => "DistanceDecayIsolation",
            Self::DistanceDecayInteraction => "DistanceDecayInteraction",
            Self::SpatialDissim => "SpatialDissim",
        }
    }

    /// Compute the index for one group of a frame
    pub fn compute(self, frame: &Frame<'_>, group: IncomeGroup) -> Result<f64> {
        if frame.is_empty() {
            return Err(IncsegError::Index(format!(
                "{} needs at least one unit with households",
                self.name()
            )));
        }

        let x = frame.group(group);
        let t = frame.totals();
        let value = match self {
            Self::Dissim => dissim(&x, t),
            Self::Gini => gini(&x, t),
            Self::Entropy => entropy(&x, t),
            Self::Atkinson => atkinson(&x, t),
            Self::Isolation => isolation(&x, t),
            Self::Interaction => interaction(&x, t),
            Self::CorrelationR => correlation_ratio(&x, t),
            Self::Delta => delta(&x, &frame.areas()),
            Self::AbsoluteConcentration => absolute_concentration(&x, t, &frame.areas()),
            Self::RelativeConcentration => relative_concentration(&x, t, &frame.areas()),
            Self::AbsoluteCentralization => {
                centralization(&x, &frame.areas(), &center_distances(frame))
            }
            Self::RelativeCentralization => {
                let y: Vec<f64> = t.iter().zip(&x).map(|(t, x)| t - x).collect();
                centralization(&x, &y, &center_distances(frame))
            }
            Self::AbsoluteClustering => absolute_clustering(frame, &x, t),
            Self::DistanceDecayIsolation => distance_decay_exposure(frame, &x, t, &x),
            Self::DistanceDecayInteraction => {
                let y: Vec<f64> = t.iter().zip(&x).map(|(t, x)| t - x).collect();
                distance_decay_exposure(frame, &x, t, &y)
            }
            Self::SpatialDissim => spatial_dissim(frame, &x, t)?,
        };
        Ok(value)
    }
}

impl fmt::Display for SingleGroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SingleGroupIndex {
    type Err = IncsegError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|index| index.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| IncsegError::Index(format!("Unknown single-group index '{s}'")))
    }
}

fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

fn overall_proportion(x: &[f64], t: &[f64]) -> f64 {
    proportion(sum(x), sum(t))
}

fn binary_entropy(p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    super::entropy_term(p) + super::entropy_term(1.0 - p)
}

fn dissim(x: &[f64], t: &[f64]) -> f64 {
    let big_x = sum(x);
    let big_y = sum(t) - big_x;
    if big_x <= 0.0 || big_y <= 0.0 {
        return f64::NAN;
    }
    0.5 * x
        .iter()
        .zip(t)
        .map(|(&x, &t)| (x / big_x - (t - x) / big_y).abs())
        .sum::<f64>()
}

fn gini(x: &[f64], t: &[f64]) -> f64 {
    let total = sum(t);
    let p = overall_proportion(x, t);
    if p <= 0.0 || p >= 1.0 {
        return f64::NAN;
    }
    let spread = weighted_pair_spread(x.iter().zip(t).map(|(&x, &t)| (x / t, t)));
    spread / (2.0 * total * total * p * (1.0 - p))
}

fn entropy(x: &[f64], t: &[f64]) -> f64 {
    let total = sum(t);
    let e = binary_entropy(overall_proportion(x, t));
    if e <= 0.0 {
        return f64::NAN;
    }
    x.iter()
        .zip(t)
        .map(|(&x, &t)| t * (e - binary_entropy(x / t)))
        .sum::<f64>()
        / (e * total)
}

fn atkinson(x: &[f64], t: &[f64]) -> f64 {
    let total = sum(t);
    let p = overall_proportion(x, t);
    if p <= 0.0 || p >= 1.0 {
        return f64::NAN;
    }
    let b = ATKINSON_SHAPE;
    let inner = x
        .iter()
        .zip(t)
        .map(|(&x, &t)| {
            let pi = (x / t).clamp(0.0, 1.0);
            (1.0 - pi).powf(1.0 - b) * pi.powf(b) * t
        })
        .sum::<f64>()
        / (p * total);
    1.0 - p / (1.0 - p) * inner.abs().powf(1.0 / (1.0 - b))
}

fn isolation(x: &[f64], t: &[f64]) -> f64 {
    let big_x = sum(x);
    if big_x <= 0.0 {
        return f64::NAN;
    }
    x.iter().zip(t).map(|(&x, &t)| x / big_x * (x / t)).sum()
}

fn interaction(x: &[f64], t: &[f64]) -> f64 {
    let big_x = sum(x);
    if big_x <= 0.0 {
        return f64::NAN;
    }
    x.iter()
        .zip(t)
        .map(|(&x, &t)| x / big_x * ((t - x) / t))
        .sum()
}

fn correlation_ratio(x: &[f64], t: &[f64]) -> f64 {
    let p = overall_proportion(x, t);
    if p <= 0.0 || p >= 1.0 {
        return f64::NAN;
    }
    (isolation(x, t) - p) / (1.0 - p)
}

fn delta(x: &[f64], area: &[f64]) -> f64 {
    let big_x = sum(x);
    let big_a = sum(area);
    if big_x <= 0.0 || big_a <= 0.0 {
        return f64::NAN;
    }
    0.5 * x
        .iter()
        .zip(area)
        .map(|(&x, &a)| (x / big_x - a / big_a).abs())
        .sum::<f64>()
}

/// Population and population-weighted area of the units taken from `order`
/// until their population reaches `target`
fn accumulate_until<'a>(
    order: impl Iterator<Item = &'a usize>,
    t: &[f64],
    area: &[f64],
    target: f64,
) -> (f64, f64) {
    let (mut population, mut weighted_area) = (0.0, 0.0);
    for &i in order {
        population += t[i];
        weighted_area += t[i] * area[i];
        if population >= target {
            break;
        }
    }
    (population, weighted_area)
}

/// Mean area of the smallest and of the largest units that could hold the
/// whole group, weighted by population
fn concentration_bounds(x: &[f64], t: &[f64], area: &[f64]) -> (f64, f64) {
    let big_x = sum(x);
    let mut order: Vec<usize> = (0..area.len()).collect();
    order.sort_by(|&a, &b| area[a].total_cmp(&area[b]));

    let (t1, ta1) = accumulate_until(order.iter(), t, area, big_x);
    let (t2, ta2) = accumulate_until(order.iter().rev(), t, area, big_x);
    (ta1 / t1, ta2 / t2)
}

fn absolute_concentration(x: &[f64], t: &[f64], area: &[f64]) -> f64 {
    let big_x = sum(x);
    if big_x <= 0.0 {
        return f64::NAN;
    }
    let observed = x.iter().zip(area).map(|(x, a)| x * a).sum::<f64>() / big_x;
    let (smallest, largest) = concentration_bounds(x, t, area);
    let range = largest - smallest;
    if range == 0.0 {
        return f64::NAN;
    }
    1.0 - (observed - smallest) / range
}

fn relative_concentration(x: &[f64], t: &[f64], area: &[f64]) -> f64 {
    let big_x = sum(x);
    let big_y = sum(t) - big_x;
    if big_x <= 0.0 || big_y <= 0.0 {
        return f64::NAN;
    }
    let group_area = x.iter().zip(area).map(|(x, a)| x * a).sum::<f64>() / big_x;
    let other_area = t
        .iter()
        .zip(x)
        .zip(area)
        .map(|((t, x), a)| (t - x) * a)
        .sum::<f64>()
        / big_y;
    let (smallest, largest) = concentration_bounds(x, t, area);
    let extreme = smallest / largest - 1.0;
    if extreme == 0.0 {
        return f64::NAN;
    }
    (group_area / other_area - 1.0) / extreme
}

/// Distance from each unit centroid to the mean centroid of the frame
fn center_distances(frame: &Frame<'_>) -> Vec<f64> {
    let ctx = frame.ctx();
    let n = frame.len() as f64;
    let center = frame.units().iter().fold(Coord { x: 0.0, y: 0.0 }, |acc, &unit| {
        let c = ctx.unit(unit).centroid;
        Coord {
            x: acc.x + c.x / n,
            y: acc.y + c.y / n,
        }
    });
    frame
        .units()
        .iter()
        .map(|&unit| {
            let c = ctx.unit(unit).centroid;
            (c.x - center.x).hypot(c.y - center.y)
        })
        .collect()
}

/// `sum X[i-1] O[i] - X[i] O[i-1]` over cumulative proportions of the group
/// and of a reference quantity, units ordered by distance from the center
fn centralization(x: &[f64], reference: &[f64], distance: &[f64]) -> f64 {
    let big_x = sum(x);
    let big_o = sum(reference);
    if big_x <= 0.0 || big_o <= 0.0 {
        return f64::NAN;
    }
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| distance[a].total_cmp(&distance[b]));

    let (mut cum_x, mut cum_o, mut value) = (0.0, 0.0, 0.0);
    for i in order {
        let (next_x, next_o) = (cum_x + x[i] / big_x, cum_o + reference[i] / big_o);
        value += cum_x * next_o - next_x * cum_o;
        cum_x = next_x;
        cum_o = next_o;
    }
    value
}

fn absolute_clustering(frame: &Frame<'_>, x: &[f64], t: &[f64]) -> f64 {
    let big_x = sum(x);
    if big_x <= 0.0 {
        return f64::NAN;
    }
    let decay = frame.decay();
    let n = x.len() as f64;
    let baseline = big_x / (n * n) * decay.total();
    let lag_x = decay.lag(x);
    let lag_t = decay.lag(t);

    let numerator = x.iter().zip(&lag_x).map(|(x, l)| x / big_x * l).sum::<f64>() - baseline;
    let denominator = x.iter().zip(&lag_t).map(|(x, l)| x / big_x * l).sum::<f64>() - baseline;
    numerator / denominator
}

/// Distance decay exposure of the group to `other`: the probability that a
/// neighbour met by a group member, weighted by decay and population, is
/// from `other`
fn distance_decay_exposure(frame: &Frame<'_>, x: &[f64], t: &[f64], other: &[f64]) -> f64 {
    let big_x = sum(x);
    if big_x <= 0.0 {
        return f64::NAN;
    }
    let decay = frame.decay();
    let lag_other = decay.lag(other);
    let lag_t = decay.lag(t);
    x.iter()
        .zip(lag_other.iter().zip(&lag_t))
        .map(|(x, (o, t))| x / big_x * proportion(*o, *t))
        .sum()
}

fn spatial_dissim(frame: &Frame<'_>, x: &[f64], t: &[f64]) -> Result<f64> {
    let graph = frame.ctx().contiguity();
    let components = graph.component_count();
    if components > 1 {
        return Err(IncsegError::Disconnected { components });
    }

    let positions: FxHashMap<usize, usize> = frame
        .units()
        .iter()
        .enumerate()
        .map(|(pos, &unit)| (unit, pos))
        .collect();
    let shares: Vec<f64> = x.iter().zip(t).map(|(x, t)| x / t).collect();

    let (mut spread, mut links) = (0.0, 0.0);
    for (pos, &unit) in frame.units().iter().enumerate() {
        for other in graph.neighbors(unit) {
            if let Some(&q) = positions.get(other) {
                spread += (shares[pos] - shares[q]).abs();
                links += 1.0;
            }
        }
    }
    if links == 0.0 {
        return Ok(f64::NAN);
    }
    Ok(dissim(x, t) - spread / links)
}
