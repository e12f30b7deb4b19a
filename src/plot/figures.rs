//! Static PNG figures of the persisted index tables
//!
//! Each figure set is written into a metro scoped directory and sealed with a
//! completion marker. A sealed set is skipped. A failed set removes the files
//! it wrote, and the directory itself when nothing else is left in it.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::config::PathConfig;
use crate::error::util::{create_dir_all, remove_dir_if_exists};
use crate::error::{IncsegError, Result};
use crate::models::ArrowTable;
use crate::models::income::IncomeExtreme;
use crate::models::results::{Artifact, IndexTable, ProfileIndex, ProfileTable};
use crate::utils::io::paths::{COMPLETION_MARKER, FigurePaths, MetroPaths};
use crate::utils::logging::log_metro_failure;

type DrawResult = std::result::Result<(), Box<dyn Error>>;

/// Colorbrewer Blues, 7 classes
const BLUES: [RGBColor; 7] = [
    RGBColor(0xef, 0xf3, 0xff),
    RGBColor(0xc6, 0xdb, 0xef),
    RGBColor(0x9e, 0xca, 0xe1),
    RGBColor(0x6b, 0xae, 0xd6),
    RGBColor(0x42, 0x92, 0xc6),
    RGBColor(0x21, 0x71, 0xb5),
    RGBColor(0x08, 0x45, 0x94),
];

/// Colorbrewer Reds, 7 classes
const REDS: [RGBColor; 7] = [
    RGBColor(0xfe, 0xe5, 0xd9),
    RGBColor(0xfc, 0xbb, 0xa1),
    RGBColor(0xfc, 0x92, 0x72),
    RGBColor(0xfb, 0x6a, 0x4a),
    RGBColor(0xef, 0x3b, 0x2c),
    RGBColor(0xcb, 0x18, 0x1d),
    RGBColor(0x99, 0x00, 0x0d),
];

/// Result of generating one figure set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FigureOutcome {
    Written { dir: PathBuf, files: Vec<PathBuf> },
    /// The directory already carries the completion marker
    Skipped { dir: PathBuf },
    /// Rendering failed and the files of this set were removed
    Failed { dir: PathBuf, reason: String },
}

impl FigureOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Renders figures from the artifacts under `data_root` into `figures_root`
#[derive(Debug, Clone)]
pub struct FigureGenerator {
    data_root: PathBuf,
    figures_root: PathBuf,
}

impl FigureGenerator {
    #[must_use]
    pub fn new(data_root: &Path, figures_root: &Path) -> Self {
        Self {
            data_root: data_root.to_path_buf(),
            figures_root: figures_root.to_path_buf(),
        }
    }

    #[must_use]
    pub fn from_paths(paths: &PathConfig) -> Self {
        Self::new(&paths.output_root(), &paths.figures_root())
    }

    /// One line and bar figure per single-group index of one group
    pub fn plot_trend_graphs(
        &self,
        group: IncomeExtreme,
        metro_name: &str,
        metro: &str,
        dpi: u32,
    ) -> FigureOutcome {
        let figures = FigurePaths::new(&self.figures_root, metro);
        let artifact = MetroPaths::new(&self.data_root, metro).artifact(Artifact::Singlegroup { group });
        let marker = format!("{COMPLETION_MARKER}_{group}");

        guarded(&figures.singlegroup_dir(), &marker, metro, |written| {
            let table = IndexTable::read_parquet(&artifact)?;
            for index in table.indices() {
                let values = table.series(index).unwrap_or_default();
                let path = figures.singlegroup_figure(index, group);
                let title = format!("{metro_name}: {} {index}", group.description());
                draw_trend(&path, &title, index, table.years(), &values, dpi)
                    .map_err(|e| plot_error(&path, e.as_ref()))?;
                written.push(path);
            }
            Ok(())
        })
    }

    /// Entropy and isolation profiles of both groups, one line per year
    pub fn plot_multiscalar_graphs(&self, metro_name: &str, metro: &str, dpi: u32) -> FigureOutcome {
        let figures = FigurePaths::new(&self.figures_root, metro);
        let artifacts = MetroPaths::new(&self.data_root, metro);

        guarded(&figures.multiscalar_dir(), COMPLETION_MARKER, metro, |written| {
            for index in ProfileIndex::ALL {
                let low = ProfileTable::read_parquet(&artifacts.artifact(Artifact::Spacetime {
                    index,
                    group: IncomeExtreme::Low,
                }))?;
                let high = ProfileTable::read_parquet(&artifacts.artifact(Artifact::Spacetime {
                    index,
                    group: IncomeExtreme::High,
                }))?;
                let path = figures.multiscalar_figure(index);
                let title = format!(
                    "{metro_name}: Multiscalar {} Segregation Profiles",
                    capitalize(index.label())
                );
                draw_profiles(&path, &title, &low, &high, dpi).map_err(|e| plot_error(&path, e.as_ref()))?;
                written.push(path);
            }
            Ok(())
        })
    }

    /// Trend graphs of both groups and the multiscalar profiles
    pub fn plot_metro(&self, metro_name: &str, metro: &str, dpi: u32) -> Vec<FigureOutcome> {
        IncomeExtreme::ALL
            .iter()
            .map(|&group| self.plot_trend_graphs(group, metro_name, metro, dpi))
            .chain(std::iter::once(self.plot_multiscalar_graphs(metro_name, metro, dpi)))
            .collect()
    }
}

fn plot_error(path: &Path, e: &dyn Error) -> IncsegError {
    IncsegError::Plot(format!("{}: {e}", path.display()))
}

/// Run `render` unless `dir` holds `marker`, rolling back on failure
fn guarded(
    dir: &Path,
    marker: &str,
    metro: &str,
    render: impl FnOnce(&mut Vec<PathBuf>) -> Result<()>,
) -> FigureOutcome {
    let marker_path = dir.join(marker);
    if marker_path.exists() {
        log::info!("Figures in {} are complete, skipping", dir.display());
        return FigureOutcome::Skipped {
            dir: dir.to_path_buf(),
        };
    }

    let mut written = Vec::new();
    let result = create_dir_all(dir).and_then(|()| render(&mut written)).and_then(|()| {
        fs::write(&marker_path, chrono::Utc::now().to_rfc3339())
            .map_err(|e| IncsegError::io(&marker_path, e))
    });

    match result {
        Ok(()) => {
            log::info!("Wrote {} figures to {}", written.len(), dir.display());
            FigureOutcome::Written {
                dir: dir.to_path_buf(),
                files: written,
            }
        }
        Err(e) => {
            log_metro_failure(metro, &e);
            for file in &written {
                if let Err(cleanup) = fs::remove_file(file) {
                    log::warn!("Could not remove {}: {cleanup}", file.display());
                }
            }
            let empty = fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none());
            if empty {
                if let Err(cleanup) = remove_dir_if_exists(dir) {
                    log::warn!("Could not remove {}: {cleanup}", dir.display());
                }
            }
            FigureOutcome::Failed {
                dir: dir.to_path_buf(),
                reason: e.to_string(),
            }
        }
    }
}

/// Pixel size of a figure given in inches
fn pixels(width: f64, height: f64, dpi: u32) -> (u32, u32) {
    let dpi = f64::from(dpi.max(50));
    ((width * dpi).round() as u32, (height * dpi).round() as u32)
}

/// Finite bounds of a series, padded by 5%
fn bounds(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-6);
    (lo - pad, hi + pad)
}

fn draw_trend(path: &Path, title: &str, index: &str, years: &[i32], values: &[f64], dpi: u32) -> DrawResult {
    let scale = f64::from(dpi.max(50)) / 100.0;
    let first = years.first().copied().unwrap_or(0);
    let last = years.last().copied().unwrap_or(first).max(first + 1);
    let points: Vec<(i32, f64)> = years
        .iter()
        .copied()
        .zip(values.iter().copied())
        .filter(|(_, v)| v.is_finite())
        .collect();
    let (lo, hi) = bounds(values.iter().copied());

    let root = BitMapBackend::new(path, pixels(10.0, 4.0, dpi)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 16.0 * scale))?;
    let panels = root.split_evenly((1, 2));

    let mut line = ChartBuilder::on(&panels[0])
        .margin(10.0 * scale)
        .x_label_area_size(30.0 * scale)
        .y_label_area_size(60.0 * scale)
        .build_cartesian_2d(first..last, lo..hi)?;
    line.configure_mesh()
        .x_desc("Year")
        .y_desc(index)
        .label_style(("sans-serif", 10.0 * scale))
        .draw()?;
    line.draw_series(LineSeries::new(points.iter().copied(), BLUE.stroke_width(2)))?;
    line.draw_series(points.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))?;

    let mut bars = ChartBuilder::on(&panels[1])
        .margin(10.0 * scale)
        .x_label_area_size(30.0 * scale)
        .y_label_area_size(60.0 * scale)
        .build_cartesian_2d((first..last).into_segmented(), lo.min(0.0)..hi.max(0.0))?;
    bars.configure_mesh()
        .disable_x_mesh()
        .x_desc("Year")
        .label_style(("sans-serif", 10.0 * scale))
        .draw()?;
    bars.draw_series(
        Histogram::vertical(&bars)
            .style(BLUE.mix(0.7).filled())
            .margin(5)
            .data(points.iter().copied()),
    )?;

    root.present()?;
    Ok(())
}

/// Ramp color of the `i`th of `n` years
fn ramp(colors: &[RGBColor; 7], i: usize, n: usize) -> RGBColor {
    if n <= 1 {
        colors[6]
    } else {
        colors[(i * 6) / (n - 1)]
    }
}

fn draw_profiles(path: &Path, title: &str, low: &ProfileTable, high: &ProfileTable, dpi: u32) -> DrawResult {
    let scale = f64::from(dpi.max(50)) / 100.0;
    let max_distance = low
        .distances()
        .iter()
        .chain(high.distances())
        .copied()
        .max()
        .unwrap_or(1);
    let y_max = [low.max_value(), high.max_value()]
        .into_iter()
        .flatten()
        .reduce(f64::max)
        .unwrap_or(1.0)
        * 1.05;

    let root = BitMapBackend::new(path, pixels(6.0, 4.0, dpi)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 14.0 * scale))
        .margin(10.0 * scale)
        .x_label_area_size(30.0 * scale)
        .y_label_area_size(50.0 * scale)
        .build_cartesian_2d(0.0..f64::from(max_distance), 0.0..y_max.max(1e-6))?;
    chart
        .configure_mesh()
        .x_desc("Distance (m)")
        .label_style(("sans-serif", 10.0 * scale))
        .draw()?;

    for (table, colors, label) in [(low, &BLUES, "Low Income"), (high, &REDS, "High Income")] {
        let years = table.years();
        for (i, &year) in years.iter().enumerate() {
            let color = ramp(colors, i, years.len());
            let points: Vec<(f64, f64)> = table
                .distances()
                .iter()
                .zip(table.profile(year).unwrap_or_default())
                .filter(|(_, v)| v.is_finite())
                .map(|(&d, v)| (f64::from(d), v))
                .collect();
            let series = chart.draw_series(LineSeries::new(points, color.stroke_width(2)))?;
            // Only the end years get a legend entry
            if i == 0 || i + 1 == years.len() {
                series
                    .label(format!("{label} {year}"))
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        }
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(("sans-serif", 10.0 * scale))
        .draw()?;

    root.present()?;
    Ok(())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifacts_roll_back() {
        let dir = tempfile::tempdir().unwrap();
        let generator = FigureGenerator::new(&dir.path().join("data"), &dir.path().join("figures"));

        let outcome = generator.plot_trend_graphs(IncomeExtreme::High, "Nowhere", "00000", 100);
        assert!(outcome.is_failure());
        assert!(!dir.path().join("figures/00000/singlegroup").exists());

        let outcome = generator.plot_multiscalar_graphs("Nowhere", "00000", 100);
        assert!(outcome.is_failure());
        assert!(!dir.path().join("figures/00000/multiscalar").exists());
    }

    #[test]
    fn test_marker_skips() {
        let dir = tempfile::tempdir().unwrap();
        let figures = dir.path().join("figures");
        let generator = FigureGenerator::new(&dir.path().join("data"), &figures);
        let target = figures.join("00000/multiscalar");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join(COMPLETION_MARKER), "done").unwrap();

        assert_eq!(
            generator.plot_multiscalar_graphs("Nowhere", "00000", 100),
            FigureOutcome::Skipped { dir: target }
        );
    }

    #[test]
    fn test_failed_render_removes_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("figures/00000/singlegroup");

        let outcome = guarded(&target, COMPLETION_MARKER, "00000", |written| {
            let drawn = target.join("00000_gini_low.png");
            fs::write(&drawn, b"png").unwrap();
            written.push(drawn);
            // Already gone by the time the rollback runs
            written.push(target.join("00000_dissim_low.png"));
            Err(IncsegError::Plot("font unavailable".into()))
        });

        assert_eq!(
            outcome,
            FigureOutcome::Failed {
                dir: target.clone(),
                reason: "Plot error: font unavailable".into(),
            }
        );
        assert!(!target.exists());
    }

    #[test]
    fn test_failed_render_keeps_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("figures/00000/singlegroup");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join(".complete_high"), "done").unwrap();

        let outcome = guarded(&target, ".complete_low", "00000", |written| {
            let drawn = target.join("00000_gini_low.png");
            fs::write(&drawn, b"png").unwrap();
            written.push(drawn);
            Err(IncsegError::Plot("font unavailable".into()))
        });

        assert!(outcome.is_failure());
        assert!(target.join(".complete_high").exists());
        assert!(!target.join("00000_gini_low.png").exists());
    }

    #[test]
    fn test_ramp_ends() {
        assert_eq!(ramp(&REDS, 0, 7), REDS[0]);
        assert_eq!(ramp(&REDS, 6, 7), REDS[6]);
        assert_eq!(ramp(&BLUES, 0, 1), BLUES[6]);
        assert_eq!(bounds([f64::NAN]), (0.0, 1.0));
    }
}
