//! Test utilities
//!
//! Synthetic input generation shared by the unit tests, the integration
//! tests and the `demo-data` command.

pub mod fixtures;
pub mod helpers;

pub use fixtures::{SyntheticData, SyntheticMetro};
pub use helpers::{synthetic_workspace, test_config};
