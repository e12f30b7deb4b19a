//! Polygon contiguity and connected components
//!
//! Two block groups are queen neighbours when they share at least one
//! vertex and rook neighbours when they share at least one edge. Vertices
//! are matched after quantizing coordinates to centimetres so that shared
//! boundaries digitised once and projected identically always match.

use std::fmt;

use geo_types::{Coord, LineString, MultiPolygon};
use itertools::Itertools;
use petgraph::unionfind::UnionFind;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Neighbour list of one unit
pub type Neighbors = SmallVec<[usize; 8]>;

/// Contiguity rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contiguity {
    /// Shared vertex
    #[default]
    Queen,
    /// Shared edge
    Rook,
}

impl fmt::Display for Contiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queen => f.write_str("queen"),
            Self::Rook => f.write_str("rook"),
        }
    }
}

type VertexKey = (i64, i64);

fn vertex_key(c: Coord<f64>) -> VertexKey {
    ((c.x * 100.0).round() as i64, (c.y * 100.0).round() as i64)
}

fn rings(geometry: &MultiPolygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    geometry
        .0
        .iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
}

fn vertex_keys(geometry: &MultiPolygon<f64>) -> FxHashSet<VertexKey> {
    rings(geometry)
        .flat_map(|ring| ring.coords().copied().map(vertex_key))
        .collect()
}

fn edge_keys(geometry: &MultiPolygon<f64>) -> FxHashSet<(VertexKey, VertexKey)> {
    rings(geometry)
        .flat_map(|ring| {
            ring.coords()
                .copied()
                .map(vertex_key)
                .tuple_windows()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
        })
        .collect()
}

/// Symmetric contiguity graph over a set of polygons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContiguityGraph {
    neighbors: Vec<Neighbors>,
}

impl ContiguityGraph {
    /// Build the graph for a list of geometries
    #[must_use]
    pub fn build(geometries: &[MultiPolygon<f64>], rule: Contiguity) -> Self {
        let mut neighbors: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); geometries.len()];

        match rule {
            Contiguity::Queen => {
                let mut owners: FxHashMap<VertexKey, SmallVec<[usize; 4]>> = FxHashMap::default();
                for (unit, geometry) in geometries.iter().enumerate() {
                    for key in vertex_keys(geometry) {
                        owners.entry(key).or_default().push(unit);
                    }
                }
                link_owners(owners.into_values(), &mut neighbors);
            }
            Contiguity::Rook => {
                let mut owners: FxHashMap<(VertexKey, VertexKey), SmallVec<[usize; 4]>> =
                    FxHashMap::default();
                for (unit, geometry) in geometries.iter().enumerate() {
                    for key in edge_keys(geometry) {
                        owners.entry(key).or_default().push(unit);
                    }
                }
                link_owners(owners.into_values(), &mut neighbors);
            }
        }

        Self {
            neighbors: neighbors
                .into_iter()
                .map(|set| set.into_iter().sorted_unstable().collect())
                .collect(),
        }
    }

    /// Build a graph from explicit neighbour lists
    #[must_use]
    pub fn from_neighbors(neighbors: Vec<Neighbors>) -> Self {
        Self { neighbors }
    }

    /// Number of units
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Neighbours of one unit, sorted ascending
    #[must_use]
    pub fn neighbors(&self, unit: usize) -> &[usize] {
        &self.neighbors[unit]
    }

    /// Units without any neighbour
    #[must_use]
    pub fn islands(&self) -> Vec<usize> {
        self.neighbors
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_empty())
            .map(|(unit, _)| unit)
            .collect()
    }

    /// Component label per unit. Labels are numbered in order of first
    /// appearance, so unit 0 is always in component 0.
    #[must_use]
    pub fn component_labels(&self) -> Vec<usize> {
        let n = self.neighbors.len();
        let mut uf = UnionFind::<usize>::new(n);
        for (unit, neighbors) in self.neighbors.iter().enumerate() {
            for &other in neighbors {
                uf.union(unit, other);
            }
        }

        let mut label_of_root: FxHashMap<usize, usize> = FxHashMap::default();
        (0..n)
            .map(|unit| {
                let root = uf.find(unit);
                let next = label_of_root.len();
                *label_of_root.entry(root).or_insert(next)
            })
            .collect()
    }

    /// Number of connected components
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.component_labels().into_iter().max().map_or(0, |max| max + 1)
    }

    /// Membership mask of the largest component. Ties go to the component
    /// that appears first.
    #[must_use]
    pub fn largest_component(&self) -> Vec<bool> {
        let labels = self.component_labels();
        let Some(max_label) = labels.iter().copied().max() else {
            return Vec::new();
        };

        let mut sizes = vec![0usize; max_label + 1];
        for &label in &labels {
            sizes[label] += 1;
        }
        // max_by_key keeps the last maximum, so scan in reverse to keep the first
        let largest = sizes
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, size)| **size)
            .map_or(0, |(label, _)| label);

        labels.into_iter().map(|label| label == largest).collect()
    }
}

fn link_owners(
    groups: impl Iterator<Item = SmallVec<[usize; 4]>>,
    neighbors: &mut [FxHashSet<usize>],
) {
    for owners in groups {
        for (i, &a) in owners.iter().enumerate() {
            for &b in &owners[i + 1..] {
                if a != b {
                    neighbors[a].insert(b);
                    neighbors[b].insert(a);
                }
            }
        }
    }
}

/// Membership mask of the largest connected component of a set of polygons
#[must_use]
pub fn largest_component(geometries: &[MultiPolygon<f64>], rule: Contiguity) -> Vec<bool> {
    ContiguityGraph::build(geometries, rule).largest_component()
}
