//! Interactive dashboard over the persisted artifacts
//!
//! [`Dashboard::view`] assembles every panel for one selection and
//! [`page::render_page`] turns it into a self-contained HTML page. Loaded
//! tables are memoized in an [`ArtifactCache`] for the process lifetime.

pub mod page;
pub mod server;

use std::collections::HashMap;
use std::hash::Hash;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::Value;

use crate::config::IncsegConfig;
use crate::error::{IncsegError, Result};
use crate::models::ArrowTable;
use crate::models::income::IncomeExtreme;
use crate::models::map::MapLayer;
use crate::models::results::{Artifact, IndexTable, ProfileIndex, ProfileTable};
use crate::pipeline::Manifest;
use crate::plot::charts;
use crate::registry::MetroRegistry;
use crate::utils::io::paths::MetroPaths;

pub use page::render_page;
pub use server::{build_router, serve};

/// Shown in place of the panels when a metro has no artifacts
pub const NOT_GENERATED_MESSAGE: &str = "data has not been generated for this metro yet";

type Memo<K, V> = Mutex<HashMap<K, Arc<V>>>;

/// Process-wide memo of loaded tables
#[derive(Debug, Default)]
pub struct ArtifactCache {
    tables: Memo<(String, Artifact), IndexTable>,
    profiles: Memo<(String, Artifact), ProfileTable>,
    maps: Memo<(i32, String), MapLayer>,
}

impl ArtifactCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index table of one metro, read on first use
    pub fn index_table(&self, root: &Path, metro: &str, artifact: Artifact) -> Result<Arc<IndexTable>> {
        memoize(&self.tables, (metro.to_string(), artifact), || {
            IndexTable::read_parquet(&MetroPaths::new(root, metro).artifact(artifact))
        })
    }

    /// Profile table of one metro, read on first use
    pub fn profile_table(&self, root: &Path, metro: &str, artifact: Artifact) -> Result<Arc<ProfileTable>> {
        memoize(&self.profiles, (metro.to_string(), artifact), || {
            ProfileTable::read_parquet(&MetroPaths::new(root, metro).artifact(artifact))
        })
    }

    /// Tract map of one metro in one year, read on first use
    pub fn map_layer(
        &self,
        year: i32,
        metro: &str,
        load: impl FnOnce() -> Result<MapLayer>,
    ) -> Result<Arc<MapLayer>> {
        memoize(&self.maps, (year, metro.to_string()), load)
    }

    /// Number of memoized entries
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.tables).len() + lock(&self.profiles).len() + lock(&self.maps).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock<K, V>(memo: &Memo<K, V>) -> std::sync::MutexGuard<'_, HashMap<K, Arc<V>>> {
    memo.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Return the cached value or load it outside the lock. Concurrent misses
/// may both load; the first insert wins.
fn memoize<K: Eq + Hash, V>(memo: &Memo<K, V>, key: K, load: impl FnOnce() -> Result<V>) -> Result<Arc<V>> {
    if let Some(value) = lock(memo).get(&key) {
        return Ok(Arc::clone(value));
    }
    let value = Arc::new(load()?);
    Ok(Arc::clone(lock(memo).entry(key).or_insert(value)))
}

/// User choices from the sidebar. Absent fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub metro: Option<String>,
    pub group: Option<IncomeExtreme>,
    pub year: Option<i32>,
    pub multi_index: Option<String>,
    pub single_index: Option<String>,
    pub profile: Option<ProfileIndex>,
}

/// Chart specifications and narrative for a generated metro
#[derive(Debug, Clone, PartialEq)]
pub struct Panels {
    pub multi_indices: Vec<String>,
    pub multi_index: String,
    pub multi_text: String,
    pub multi_trend: Value,
    pub multi_overview: Value,
    pub single_indices: Vec<String>,
    pub single_index: String,
    pub single_text: String,
    pub single_trend: Value,
    pub single_overview: Value,
    pub dimensions: Value,
    pub profiles: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// The metro has no completed build
    NotGenerated,
    Ready(Box<Panels>),
}

/// Everything the page needs for one selection
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// `(code, title)` of every metro in the registry
    pub metros: Vec<(String, String)>,
    pub metro: String,
    pub title: String,
    pub group: IncomeExtreme,
    pub year: i32,
    pub years: Vec<i32>,
    pub profile: ProfileIndex,
    /// Median household income choropleth, absent when the tract layer is
    /// unavailable
    pub map: Option<Value>,
    pub state: ViewState,
}

impl DashboardView {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ViewState::Ready(_))
    }
}

/// Dashboard state shared by all requests
#[derive(Debug)]
pub struct Dashboard {
    config: IncsegConfig,
    registry: MetroRegistry,
    cache: ArtifactCache,
}

impl Dashboard {
    #[must_use]
    pub fn new(config: IncsegConfig, registry: MetroRegistry) -> Self {
        Self {
            config,
            registry,
            cache: ArtifactCache::new(),
        }
    }

    /// Load the registry named by the configuration
    pub fn load(config: IncsegConfig) -> Result<Self> {
        let registry = MetroRegistry::load(&config.paths.registry_path())?;
        Ok(Self::new(config, registry))
    }

    #[must_use]
    pub fn config(&self) -> &IncsegConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &MetroRegistry {
        &self.registry
    }

    #[must_use]
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Build the view for a selection
    pub fn view(&self, selection: &Selection) -> Result<DashboardView> {
        let metro = match non_empty(selection.metro.as_deref()) {
            Some(code) => self.registry.get(code)?,
            None => self
                .registry
                .metros()
                .next()
                .ok_or_else(|| IncsegError::Config("The metro registry is empty".to_string()))?,
        };
        let years = self.config.analysis.years();
        let year = selection
            .year
            .filter(|year| years.contains(year))
            .unwrap_or_else(|| self.default_year(&years));
        let group = selection.group.unwrap_or(IncomeExtreme::High);
        let profile = selection.profile.unwrap_or(ProfileIndex::Entropy);

        let map = match self.map(year, &metro.code) {
            Ok(layer) => Some(charts::choropleth(&layer)),
            Err(e) => {
                log::warn!("No map for metro {} in {year}: {e}", metro.code);
                None
            }
        };

        let state = match self.panels(&metro.code, &metro.title, group, profile, selection) {
            Ok(panels) => ViewState::Ready(Box::new(panels)),
            Err(IncsegError::NotGenerated(code)) => {
                log::info!("Metro {code} has no completed build");
                ViewState::NotGenerated
            }
            Err(e) => return Err(e),
        };

        Ok(DashboardView {
            metros: self
                .registry
                .metros()
                .map(|m| (m.code.clone(), m.title.clone()))
                .collect(),
            metro: metro.code.clone(),
            title: metro.title.clone(),
            group,
            year,
            years,
            profile,
            map,
            state,
        })
    }

    fn default_year(&self, years: &[i32]) -> i32 {
        let preferred = self.config.dashboard.default_map_year;
        if years.contains(&preferred) {
            preferred
        } else {
            years.last().copied().unwrap_or(preferred)
        }
    }

    fn map(&self, year: i32, metro: &str) -> Result<Arc<MapLayer>> {
        let counties = self.registry.counties(metro)?;
        let path = self.config.paths.tract_path(year);
        self.cache
            .map_layer(year, metro, || MapLayer::load(&path, year, counties))
    }

    fn panels(
        &self,
        metro: &str,
        title: &str,
        group: IncomeExtreme,
        profile: ProfileIndex,
        selection: &Selection,
    ) -> Result<Panels> {
        let root = self.config.paths.output_root();
        if Manifest::read(&MetroPaths::new(&root, metro))?.is_none() {
            return Err(IncsegError::NotGenerated(metro.to_string()));
        }

        let multi = self.cache.index_table(&root, metro, Artifact::Multigroup)?;
        let single = self
            .cache
            .index_table(&root, metro, Artifact::Singlegroup { group })?;
        let high = self.cache.profile_table(
            &root,
            metro,
            Artifact::Spacetime {
                index: profile,
                group: IncomeExtreme::High,
            },
        )?;
        let low = self.cache.profile_table(
            &root,
            metro,
            Artifact::Spacetime {
                index: profile,
                group: IncomeExtreme::Low,
            },
        )?;

        let multi_index = choose(&multi, selection.multi_index.as_deref())?;
        let single_index = choose(&single, selection.single_index.as_deref())?;

        Ok(Panels {
            multi_text: format!(
                "In {title}, {}",
                charts::generate_delta_text(&multi_index, charts::get_delta(&multi, &multi_index)?)
            ),
            multi_trend: charts::gen_single(&multi, &multi_index)?,
            multi_overview: charts::gen_multi(&multi),
            multi_indices: multi.indices().to_vec(),
            multi_index,
            single_text: format!(
                "For very {group} income households in {title}, {}",
                charts::generate_delta_text(&single_index, charts::get_delta(&single, &single_index)?)
            ),
            single_trend: charts::gen_single(&single, &single_index)?,
            single_overview: charts::plot_all_single(&single, group),
            single_indices: single.indices().to_vec(),
            single_index,
            dimensions: charts::dimension_charts(&single),
            profiles: charts::profile_charts(&high, &low, profile),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The requested index when the table has it, otherwise the first one
fn choose(table: &IndexTable, requested: Option<&str>) -> Result<String> {
    let indices = table.indices();
    non_empty(requested)
        .and_then(|name| indices.iter().find(|index| index.as_str() == name))
        .or_else(|| indices.first())
        .cloned()
        .ok_or_else(|| IncsegError::Index("The index table has no columns".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memoize_loads_once() {
        let memo: Memo<u8, String> = Mutex::default();
        let first = memoize(&memo, 1, || Ok("a".to_string())).unwrap();
        let second = memoize(&memo, 1, || panic!("cached value must be reused")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(memoize(&memo, 2, || Err(IncsegError::Index("boom".into()))).is_err());
        assert_eq!(lock(&memo).len(), 1);
    }

    #[test]
    fn test_choose_falls_back_to_first() {
        let table = IndexTable::new(
            vec!["Dissim".into(), "Gini".into()],
            vec![2012],
            vec![vec![0.1, 0.2]],
        )
        .unwrap();
        assert_eq!(choose(&table, Some("Gini")).unwrap(), "Gini");
        assert_eq!(choose(&table, Some("Nope")).unwrap(), "Dissim");
        assert_eq!(choose(&table, Some("  ")).unwrap(), "Dissim");
        assert_eq!(choose(&table, None).unwrap(), "Dissim");
    }

    #[test]
    fn test_selection_from_query() {
        let selection: Selection =
            serde_json::from_value(serde_json::json!({"metro": "31080", "group": "low", "profile": "isolation"}))
                .unwrap();
        assert_eq!(selection.group, Some(IncomeExtreme::Low));
        assert_eq!(selection.profile, Some(ProfileIndex::Isolation));
        assert_eq!(selection.year, None);
    }
}
