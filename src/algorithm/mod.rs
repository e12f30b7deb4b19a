//! Algorithms for the segregation pipeline
//!
//! Income grouping, projection, spatial weights and the segregation index
//! math itself.

pub mod connectivity;
pub mod grouping;
pub mod projection;
pub mod segregation;
pub mod spatial;

pub use connectivity::{Contiguity, ContiguityGraph, largest_component};
pub use grouping::{filter_counties, group_incomes};
pub use projection::UtmZone;
pub use segregation::{
    Frame, MultiGroupIndex, SingleGroupIndex, multigroup_tempdyn, singlegroup_tempdyn,
    spacetime_dyn,
};
pub use spatial::{SpatialContext, SparseWeights};
