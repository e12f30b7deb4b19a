//! Chart specifications and static figures
//!
//! [`charts`] builds Vega-Lite specifications for the dashboard and
//! [`figures`] renders PNG figures with plotters.

pub mod charts;
pub mod figures;

pub use charts::{
    choropleth, dimension_charts, gen_multi, gen_single, generate_delta_text, get_delta,
    plot_all_single, profile_charts,
};
pub use figures::{FigureGenerator, FigureOutcome};
