//! Connected-components analysis.
//!
//! Components are computed with an explicit stack so deep chains cannot
//! overflow the call stack. Only relationships whose endpoints are both in
//! the node set are used; self-loops are ignored.

use crate::models::graph::{Entity, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Summary of the components of a subgraph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStats {
    /// Number of connected components.
    pub component_count: usize,
    /// Node count of the largest component.
    pub largest_component_size: usize,
    /// Mean component node count (0 for an empty graph).
    pub average_component_size: f64,
}

impl ComponentStats {
    /// Summarises a list of components.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_components(components: &[Vec<String>]) -> Self {
        if components.is_empty() {
            return Self::default();
        }
        let total: usize = components.iter().map(Vec::len).sum();
        Self {
            component_count: components.len(),
            largest_component_size: components.iter().map(Vec::len).max().unwrap_or(0),
            average_component_size: total as f64 / components.len() as f64,
        }
    }

    /// Returns true when the subgraph is a single component.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.component_count <= 1
    }
}

/// Returns the connected components of `nodes`.
///
/// Components appear in order of their first node in `nodes`, and members
/// in discovery order. Duplicate node names are collapsed.
#[must_use]
pub fn connected_components(nodes: &[&str], relationships: &[Relationship]) -> Vec<Vec<String>> {
    let node_set: HashSet<&str> = nodes.iter().copied().collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::with_capacity(node_set.len());
    for rel in relationships {
        let (from, to) = (rel.from_entity.as_str(), rel.to_entity.as_str());
        if from == to || !node_set.contains(from) || !node_set.contains(to) {
            continue;
        }
        adjacency.entry(from).or_default().push(to);
        adjacency.entry(to).or_default().push(from);
    }

    let mut visited: HashSet<&str> = HashSet::with_capacity(node_set.len());
    let mut components = Vec::new();
    let mut stack: Vec<&str> = Vec::new();

    for &start in nodes {
        if !visited.insert(start) {
            continue;
        }

        let mut component = Vec::new();
        stack.push(start);
        while let Some(node) = stack.pop() {
            component.push(node.to_string());
            for &next in adjacency.get(node).map_or(&[][..], Vec::as_slice) {
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        components.push(component);
    }

    components
}

/// Computes component statistics for a set of entities.
#[must_use]
pub fn analyze_connectivity(entities: &[Entity], relationships: &[Relationship]) -> ComponentStats {
    let nodes: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
    ComponentStats::from_components(&connected_components(&nodes, relationships))
}
