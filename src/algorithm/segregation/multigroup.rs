//! Multi-group segregation indices over all five income groups
//!
//! `p_im` is the share of group `m` in unit `i`, `P_m` the metro share of
//! group `m` and `I = sum P_m (1 - P_m)` the Simpson interaction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Frame, entropy_term, proportion, weighted_pair_spread};
use crate::error::{IncsegError, Result};

/// Multi-group indices in the order they are tabulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiGroupIndex {
    MultiDissim,
    MultiGini,
    MultiNormalizedExposure,
    MultiInformationTheory,
    MultiRelativeDiversity,
    MultiSquaredCoefficientOfVariation,
    MultiDiversity,
    SimpsonsConcentration,
    SimpsonsInteraction,
}

impl MultiGroupIndex {
    pub const ALL: [Self; 9] = [
        Self::MultiDissim,
        Self::MultiGini,
        Self::MultiNormalizedExposure,
        Self::MultiInformationTheory,
        Self::MultiRelativeDiversity,
        Self::MultiSquaredCoefficientOfVariation,
        Self::MultiDiversity,
        Self::SimpsonsConcentration,
        Self::SimpsonsInteraction,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MultiDissim => "MultiDissim",
            Self::MultiGini => "MultiGini",
            Self::MultiNormalizedExposure => "MultiNormalizedExposure",
            Self::MultiInformationTheory => "MultiInformationTheory",
            Self::MultiRelativeDiversity => "MultiRelativeDiversity",
            Self::MultiSquaredCoefficientOfVariation => "MultiSquaredCoefficientOfVariation",
            Self::MultiDiversity => "MultiDiversity",
            Self::SimpsonsConcentration => "SimpsonsConcentration",
            Self::SimpsonsInteraction => "SimpsonsInteraction",
        }
    }

    /// Compute the index over the five groups of a frame
    pub fn compute(self, frame: &Frame<'_>) -> Result<f64> {
        let composition = Composition::new(frame);
        if composition.total <= 0.0 {
            return Err(IncsegError::Index(format!(
                "{} needs at least one unit with households",
                self.name()
            )));
        }

        let c = &composition;
        Ok(match self {
            Self::MultiDissim => c.per_interaction(c.absolute_deviation() / 2.0),
            Self::MultiGini => c.per_interaction(c.gini_spread() / 2.0),
            Self::MultiNormalizedExposure => c.normalized_exposure(),
            Self::MultiInformationTheory => c.information_theory(),
            Self::MultiRelativeDiversity => c.per_interaction(c.squared_deviation(|_| 1.0)),
            Self::MultiSquaredCoefficientOfVariation => c.squared_coefficient_of_variation(),
            Self::MultiDiversity => c.diversity(),
            Self::SimpsonsConcentration => c.shares.iter().map(|p| p * p).sum(),
            Self::SimpsonsInteraction => c.interaction(),
        })
    }
}

impl fmt::Display for MultiGroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MultiGroupIndex {
    type Err = IncsegError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|index| index.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| IncsegError::Index(format!("Unknown multi-group index '{s}'")))
    }
}

/// Unit compositions and metro shares. Units whose groups sum to zero are
/// left out.
struct Composition {
    unit_totals: Vec<f64>,
    unit_shares: Vec<[f64; 5]>,
    shares: [f64; 5],
    total: f64,
}

impl Composition {
    fn new(frame: &Frame<'_>) -> Self {
        let (unit_totals, unit_shares): (Vec<f64>, Vec<[f64; 5]>) = frame
            .groups()
            .iter()
            .filter_map(|counts| {
                let total: f64 = counts.iter().sum();
                (total > 0.0).then(|| (total, counts.map(|count| count / total)))
            })
            .unzip();

        let mut group_totals = [0.0; 5];
        for counts in frame.groups() {
            for (sum, count) in group_totals.iter_mut().zip(counts) {
                *sum += count;
            }
        }
        let total: f64 = group_totals.iter().sum();

        Self {
            unit_totals,
            unit_shares,
            shares: group_totals.map(|g| proportion(g, total)),
            total,
        }
    }

    fn interaction(&self) -> f64 {
        self.shares.iter().map(|p| p * (1.0 - p)).sum()
    }

    fn diversity(&self) -> f64 {
        self.shares.iter().copied().map(entropy_term).sum()
    }

    /// `value / (T I)`, undefined when only one group is present
    fn per_interaction(&self, value: f64) -> f64 {
        let interaction = self.interaction();
        if interaction <= 0.0 {
            return f64::NAN;
        }
        value / (self.total * interaction)
    }

    /// `sum_m sum_i t_i |p_im - P_m|`
    fn absolute_deviation(&self) -> f64 {
        self.unit_totals
            .iter()
            .zip(&self.unit_shares)
            .map(|(t, p)| {
                t * p
                    .iter()
                    .zip(&self.shares)
                    .map(|(p, big_p)| (p - big_p).abs())
                    .sum::<f64>()
            })
            .sum()
    }

    /// `sum_m sum_i t_i (p_im - P_m)^2 * weight(m)`
    fn squared_deviation(&self, weight: impl Fn(usize) -> f64) -> f64 {
        self.unit_totals
            .iter()
            .zip(&self.unit_shares)
            .map(|(t, p)| {
                t * (0..5)
                    .map(|m| (p[m] - self.shares[m]).powi(2) * weight(m))
                    .sum::<f64>()
            })
            .sum()
    }

    /// `sum_m sum_i sum_j t_i t_j |p_im - p_jm| / T`
    fn gini_spread(&self) -> f64 {
        (0..5)
            .map(|m| {
                weighted_pair_spread(
                    self.unit_shares
                        .iter()
                        .zip(&self.unit_totals)
                        .map(|(p, &t)| (p[m], t)),
                )
            })
            .sum::<f64>()
            / self.total
    }

    fn normalized_exposure(&self) -> f64 {
        self.squared_deviation(|m| {
            let rest = 1.0 - self.shares[m];
            if rest > 0.0 { 1.0 / rest } else { 0.0 }
        }) / self.total
    }

    fn information_theory(&self) -> f64 {
        let e = self.diversity();
        if e <= 0.0 {
            return f64::NAN;
        }
        self.unit_totals
            .iter()
            .zip(&self.unit_shares)
            .map(|(t, p)| t * (e - p.iter().copied().map(entropy_term).sum::<f64>()))
            .sum::<f64>()
            / (e * self.total)
    }

    fn squared_coefficient_of_variation(&self) -> f64 {
        let groups = self.shares.len() as f64;
        self.squared_deviation(|m| {
            let p = self.shares[m];
            if p > 0.0 { 1.0 / p } else { 0.0 }
        }) / ((groups - 1.0) * self.total)
    }
}
