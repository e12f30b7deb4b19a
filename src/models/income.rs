//! Income group model
//!
//! ACS table B19001 reports household counts in sixteen nominal-dollar
//! brackets. The pipeline collapses them into five ordered income groups.
//! The cutoffs are fixed for every year and are not inflation adjusted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IncsegError;

/// ACS column holding the total household count
pub const TOTAL_COLUMN: &str = "B19001_001E";

/// ACS bracket columns in ascending income order
pub const BRACKET_COLUMNS: [&str; 16] = [
    "B19001_002E",
    "B19001_003E",
    "B19001_004E",
    "B19001_005E",
    "B19001_006E",
    "B19001_007E",
    "B19001_008E",
    "B19001_009E",
    "B19001_010E",
    "B19001_011E",
    "B19001_012E",
    "B19001_013E",
    "B19001_014E",
    "B19001_015E",
    "B19001_016E",
    "B19001_017E",
];

/// Five ordered, mutually exclusive income groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeGroup {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl IncomeGroup {
    /// All groups from lowest to highest income
    pub const ALL: [Self; 5] = [
        Self::VeryLow,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::VeryHigh,
    ];

    /// Column name of the group count
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::VeryLow => "very_low_inc",
            Self::Low => "low_inc",
            Self::Medium => "med_inc",
            Self::High => "high_inc",
            Self::VeryHigh => "very_high_inc",
        }
    }

    /// Column name of the group share
    #[must_use]
    pub const fn share_column(self) -> &'static str {
        match self {
            Self::VeryLow => "share_very_low_inc",
            Self::Low => "share_low_inc",
            Self::Medium => "share_med_inc",
            Self::High => "share_high_inc",
            Self::VeryHigh => "share_very_high_inc",
        }
    }

    /// Range of indices into [`BRACKET_COLUMNS`] summed into this group
    #[must_use]
    pub const fn bracket_range(self) -> std::ops::Range<usize> {
        match self {
            Self::VeryLow => 0..4,   // < $25,000
            Self::Low => 4..9,       // < $50,000
            Self::Medium => 9..11,   // < $75,000
            Self::High => 11..13,    // < $125,000
            Self::VeryHigh => 13..16, // >= $125,000
        }
    }

    /// Nominal upper income bound in dollars, `None` for the open top group
    #[must_use]
    pub const fn upper_bound(self) -> Option<u32> {
        match self {
            Self::VeryLow => Some(25_000),
            Self::Low => Some(50_000),
            Self::Medium => Some(75_000),
            Self::High => Some(125_000),
            Self::VeryHigh => None,
        }
    }

    /// Position of the group in [`IncomeGroup::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for IncomeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// The two extreme groups used by single-group measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomeExtreme {
    High,
    Low,
}

impl IncomeExtreme {
    pub const ALL: [Self; 2] = [Self::High, Self::Low];

    /// The income group this extreme refers to
    #[must_use]
    pub const fn group(self) -> IncomeGroup {
        match self {
            Self::High => IncomeGroup::VeryHigh,
            Self::Low => IncomeGroup::VeryLow,
        }
    }

    /// Short label used in artifact and figure names
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }

    /// Human readable income threshold
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::High => "High income group is >= $125,000",
            Self::Low => "Low income group is <= $25,000",
        }
    }
}

impl fmt::Display for IncomeExtreme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for IncomeExtreme {
    type Err = IncsegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            other => Err(IncsegError::Config(format!(
                "Unknown income group '{other}', expected 'high' or 'low'"
            ))),
        }
    }
}

/// Income group counts and shares for one block group in one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeGroupRecord {
    pub geoid: String,
    pub year: i32,
    pub very_low_inc: f64,
    pub low_inc: f64,
    pub med_inc: f64,
    pub high_inc: f64,
    pub very_high_inc: f64,
    pub share_very_low_inc: f64,
    pub share_low_inc: f64,
    pub share_med_inc: f64,
    pub share_high_inc: f64,
    pub share_very_high_inc: f64,
    pub total: f64,
}

impl IncomeGroupRecord {
    /// Build a record from the total and the sixteen bracket counts
    #[must_use]
    pub fn from_brackets(geoid: String, year: i32, total: f64, brackets: &[f64; 16]) -> Self {
        let counts = IncomeGroup::ALL.map(|group| brackets[group.bracket_range()].iter().sum::<f64>());
        let shares = counts.map(|count| share_of(count, total));

        Self {
            geoid,
            year,
            very_low_inc: counts[0],
            low_inc: counts[1],
            med_inc: counts[2],
            high_inc: counts[3],
            very_high_inc: counts[4],
            share_very_low_inc: shares[0],
            share_low_inc: shares[1],
            share_med_inc: shares[2],
            share_high_inc: shares[3],
            share_very_high_inc: shares[4],
            total,
        }
    }

    /// Household count of one group
    #[must_use]
    pub const fn count(&self, group: IncomeGroup) -> f64 {
        match group {
            IncomeGroup::VeryLow => self.very_low_inc,
            IncomeGroup::Low => self.low_inc,
            IncomeGroup::Medium => self.med_inc,
            IncomeGroup::High => self.high_inc,
            IncomeGroup::VeryHigh => self.very_high_inc,
        }
    }

    /// Share of total households in one group
    #[must_use]
    pub const fn share(&self, group: IncomeGroup) -> f64 {
        match group {
            IncomeGroup::VeryLow => self.share_very_low_inc,
            IncomeGroup::Low => self.share_low_inc,
            IncomeGroup::Medium => self.share_med_inc,
            IncomeGroup::High => self.share_high_inc,
            IncomeGroup::VeryHigh => self.share_very_high_inc,
        }
    }

    /// All five group counts in group order
    #[must_use]
    pub const fn counts(&self) -> [f64; 5] {
        [
            self.very_low_inc,
            self.low_inc,
            self.med_inc,
            self.high_inc,
            self.very_high_inc,
        ]
    }

    /// Two-digit state plus three-digit county prefix of the geoid
    #[must_use]
    pub fn county_fips(&self) -> &str {
        self.geoid.get(..5).unwrap_or(&self.geoid)
    }
}

/// Group count over total, with division by zero and non-finite results mapped to 0
#[must_use]
pub fn share_of(count: f64, total: f64) -> f64 {
    let share = count / total;
    if share.is_finite() { share } else { 0.0 }
}
