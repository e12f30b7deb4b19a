//! Interactive chart specifications for the dashboard
//!
//! Every chart is a Vega-Lite v5 specification built with `serde_json`, with
//! the data inlined so the page needs nothing but vega-embed to render it.

use serde_json::{Value, json};

use crate::algorithm::segregation::SingleGroupIndex;
use crate::error::{IncsegError, Result};
use crate::models::income::IncomeExtreme;
use crate::models::map::MapLayer;
use crate::models::results::{IndexTable, ProfileIndex, ProfileTable};

/// Vega-Lite schema URL
pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Position of the comparison year in narrative deltas (2018 in 2012..=2018)
pub const DELTA_POSITION: usize = 6;

/// Single-group indices shown per segregation dimension
pub const DIMENSIONS: [(&str, &[SingleGroupIndex]); 3] = [
    (
        "Evenness Dimension",
        &[
            SingleGroupIndex::Gini,
            SingleGroupIndex::Entropy,
            SingleGroupIndex::Dissim,
            SingleGroupIndex::Atkinson,
        ],
    ),
    (
        "Concentration Dimension",
        &[
            SingleGroupIndex::AbsoluteConcentration,
            SingleGroupIndex::RelativeConcentration,
            SingleGroupIndex::Delta,
        ],
    ),
    (
        "Exposure/Clustering Dimension",
        &[
            SingleGroupIndex::AbsoluteClustering,
            SingleGroupIndex::Isolation,
            SingleGroupIndex::CorrelationR,
            SingleGroupIndex::Interaction,
            SingleGroupIndex::DistanceDecayIsolation,
        ],
    ),
];

fn series(table: &IndexTable, index: &str) -> Result<Vec<f64>> {
    table
        .series(index)
        .ok_or_else(|| IncsegError::Index(format!("Index {index} is not in the table")))
}

/// Percent change of each value relative to the first one
fn relative_change(values: &[f64]) -> Vec<f64> {
    let first = values.first().copied().unwrap_or(f64::NAN);
    values.iter().map(|v| (v / first - 1.0) * 100.0).collect()
}

/// `{year, index, value}` rows of the given indices
fn long_rows<'a>(table: &IndexTable, indices: impl IntoIterator<Item = &'a str>) -> Vec<Value> {
    indices
        .into_iter()
        .filter_map(|index| table.series(index).map(|values| (index, values)))
        .flat_map(|(index, values)| {
            table
                .years()
                .iter()
                .zip(values)
                .map(move |(year, value)| json!({"year": year, "index": index, "value": value}))
        })
        .collect()
}

fn index_lines(title: &str, rows: Vec<Value>, width: u32, height: u32) -> Value {
    json!({
        "title": title,
        "width": width,
        "height": height,
        "data": {"values": rows},
        "mark": {"type": "line", "point": true},
        "encoding": {
            "x": {"field": "year", "type": "ordinal", "title": "Year"},
            "y": {"field": "value", "type": "quantitative", "title": null},
            "color": {"field": "index", "type": "nominal", "legend": {"orient": "bottom"}},
            "tooltip": [
                {"field": "index", "type": "nominal"},
                {"field": "year", "type": "ordinal"},
                {"field": "value", "type": "quantitative", "format": ".4f"}
            ]
        }
    })
}

/// Absolute values as bars next to the relative change as a line
pub fn gen_single(table: &IndexTable, index: &str) -> Result<Value> {
    let values = series(table, index)?;
    let relative = relative_change(&values);
    let rows: Vec<Value> = table
        .years()
        .iter()
        .zip(values.iter().zip(&relative))
        .map(|(year, (value, change))| json!({"year": year, "value": value, "change": change}))
        .collect();

    Ok(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "data": {"values": rows},
        "hconcat": [
            {
                "title": format!("Absolute Change in {index}"),
                "width": 300,
                "height": 260,
                "mark": "bar",
                "encoding": {
                    "x": {"field": "year", "type": "ordinal", "title": "Year"},
                    "y": {"field": "value", "type": "quantitative", "title": index}
                }
            },
            {
                "title": format!("Relative (%) Change in {index}"),
                "width": 300,
                "height": 260,
                "mark": {"type": "line", "point": true},
                "encoding": {
                    "x": {"field": "year", "type": "ordinal", "title": "Year"},
                    "y": {"field": "change", "type": "quantitative", "title": "% change"}
                }
            }
        ],
        "resolve": {"scale": {"y": "independent"}}
    }))
}

/// Every multi-group index over time
#[must_use]
pub fn gen_multi(table: &IndexTable) -> Value {
    let rows = long_rows(table, table.indices().iter().map(String::as_str));
    let mut spec = index_lines("Multigroup Income Segregation by Index Over Time", rows, 650, 420);
    spec["$schema"] = json!(VEGA_LITE_SCHEMA);
    spec
}

/// Every single-group index of one group over time
#[must_use]
pub fn plot_all_single(table: &IndexTable, group: IncomeExtreme) -> Value {
    let rows = long_rows(table, table.indices().iter().map(String::as_str));
    let title = format!("{} Income Segregation by Index Over Time", title_case(group.label()));
    let mut spec = index_lines(&title, rows, 650, 560);
    spec["$schema"] = json!(VEGA_LITE_SCHEMA);
    spec
}

/// Evenness, concentration and exposure/clustering panels side by side
#[must_use]
pub fn dimension_charts(table: &IndexTable) -> Value {
    let panels: Vec<Value> = DIMENSIONS
        .iter()
        .map(|(title, indices)| {
            let rows = long_rows(table, indices.iter().map(|index| index.name()));
            index_lines(title, rows, 370, 450)
        })
        .collect();
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "hconcat": panels,
        "resolve": {"scale": {"color": "independent", "y": "independent"}}
    })
}

fn profile_panel(
    table: &ProfileTable,
    title: &str,
    field: &str,
    scheme: &str,
    param: &str,
    other: &str,
    max: f64,
) -> Value {
    let rows: Vec<Value> = table
        .long_form()
        .into_iter()
        .map(|point| json!({"distance": point.distance, "year": point.year.to_string(), field: point.value}))
        .collect();
    let encoding = json!({
        "x": {"field": "distance", "type": "quantitative", "title": "Distance (m)"},
        "y": {"field": field, "type": "quantitative", "scale": {"domain": [0.0, max]}},
        "color": {"field": "year", "type": "ordinal", "scale": {"scheme": scheme}}
    });
    json!({
        "title": title,
        "width": 550,
        "height": 450,
        "data": {"values": rows},
        "encoding": encoding,
        "layer": [
            {
                "params": [{
                    "name": param,
                    "select": {"type": "point", "on": "mouseover", "fields": ["year"], "nearest": true}
                }],
                "mark": "circle",
                "encoding": {"opacity": {"value": 0}}
            },
            {
                "mark": "line",
                "encoding": {
                    "size": {
                        "condition": {
                            "test": {"or": [
                                {"param": param, "empty": false},
                                {"param": other, "empty": false}
                            ]},
                            "value": 3
                        },
                        "value": 1
                    }
                }
            }
        ]
    })
}

/// High and low income profiles of one index with a shared y domain.
/// Hovering a year in either chart highlights it in both.
#[must_use]
pub fn profile_charts(high: &ProfileTable, low: &ProfileTable, index: ProfileIndex) -> Value {
    let field = format!("{index} Index");
    let max = [high.max_value(), low.max_value()]
        .into_iter()
        .flatten()
        .reduce(f64::max)
        .unwrap_or(1.0);
    let name = title_case(index.label());

    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "hconcat": [
            profile_panel(
                high,
                &format!("High Income Multiscalar {name} Profile"),
                &field,
                "reds",
                "highlight_high",
                "highlight_low",
                max,
            ),
            profile_panel(
                low,
                &format!("Low Income Multiscalar {name} Profile"),
                &field,
                "blues",
                "highlight_low",
                "highlight_high",
                max,
            )
        ],
        "resolve": {"scale": {"color": "independent"}}
    })
}

fn geojson_geometry(geometry: &geo_types::MultiPolygon<f64>) -> Value {
    let ring = |ring: &geo_types::LineString<f64>| -> Vec<[f64; 2]> {
        ring.coords().map(|c| [c.x, c.y]).collect()
    };
    let polygons: Vec<Vec<Vec<[f64; 2]>>> = geometry
        .iter()
        .map(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .map(ring)
                .collect()
        })
        .collect();
    json!({"type": "MultiPolygon", "coordinates": polygons})
}

/// Median household income by tract in five quantile classes
#[must_use]
pub fn choropleth(map: &MapLayer) -> Value {
    let features: Vec<Value> = map
        .features
        .iter()
        .map(|feature| {
            json!({
                "type": "Feature",
                "properties": {
                    "geoid": feature.geoid,
                    "median_household_income": feature.median_income
                },
                "geometry": geojson_geometry(&feature.geometry)
            })
        })
        .collect();

    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "width": 1100,
        "height": 500,
        "data": {"values": {"type": "FeatureCollection", "features": features}, "format": {"type": "json", "property": "features"}},
        "projection": {"type": "mercator"},
        "mark": {"type": "geoshape", "stroke": null},
        "encoding": {
            "color": {
                "field": "properties.median_household_income",
                "type": "quantitative",
                "scale": {"type": "quantile", "scheme": "purplegreen"},
                "legend": {"title": "Median Household Income"}
            },
            "tooltip": [{
                "field": "properties.median_household_income",
                "type": "quantitative",
                "title": format!("Median Household Income (ACS 5-Year {})", map.year),
                "format": "$,.0f"
            }]
        }
    })
}

/// Percent change of an index between the first and the comparison year
///
/// Uses the last year when the table covers fewer than seven years.
pub fn get_delta(table: &IndexTable, index: &str) -> Result<f64> {
    let values = series(table, index)?;
    let relative = relative_change(&values);
    relative
        .get(DELTA_POSITION)
        .or_else(|| relative.last())
        .copied()
        .ok_or_else(|| IncsegError::Index(format!("Index {index} has no values")))
}

/// Markdown sentence describing a percent change
#[must_use]
pub fn generate_delta_text(index: &str, value: f64) -> String {
    let direction = if value > 0.0 { "grew" } else { "fell" };
    let rounded = (value.abs() * 100.0).round() / 100.0;
    format!(
        "**The {index} index {direction} by {rounded:?} percent** between the 2008-2012 and 2014-2018 ACS sampling periods  \n\n"
    )
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
