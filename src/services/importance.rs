//! Global importance layer selection.
//!
//! Picks the most important entities under a node budget and, optionally,
//! spends part of the budget on bridge entities that reconnect the selection.
//!
//! # Connectivity Repair
//!
//! Ranking by importance alone tends to select hubs whose connecting entities
//! fall below the cut, so the visualised subgraph splits into islands. With
//! `include_connectivity` set and more entities than the budget:
//!
//! 1. `reserve = floor(max_nodes * bridge_reserve_ratio)` slots are held back
//! 2. The top `max_nodes - reserve` entities by importance are selected
//! 3. While the selection has several components and reserve remains, the
//!    unselected entity adjacent to the most distinct components (ties go to
//!    higher importance) is added as a bridge
//! 4. Unspent reserve is backfilled with the next-ranked entities
//!
//! Only single-entity bridges are considered. Components that need a longer
//! path to join stay separate and are reported in the metadata.

use crate::models::graph::{Entity, Relationship};
use crate::services::connectivity::{ComponentStats, connected_components};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Parameters for importance selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportanceOptions {
    /// Maximum number of entities returned.
    pub max_nodes: usize,
    /// Whether to repair connectivity with bridge entities.
    pub include_connectivity: bool,
    /// Share of `max_nodes` held back for bridges.
    pub bridge_reserve_ratio: f64,
}

impl Default for ImportanceOptions {
    fn default() -> Self {
        Self {
            max_nodes: crate::config::DEFAULT_IMPORTANCE_MAX_NODES,
            include_connectivity: true,
            bridge_reserve_ratio: crate::config::DEFAULT_BRIDGE_RESERVE_RATIO,
        }
    }
}

impl ImportanceOptions {
    /// Creates options with the given budget and default repair settings.
    #[must_use]
    pub fn with_max_nodes(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            ..Self::default()
        }
    }

    /// Enables or disables connectivity repair.
    #[must_use]
    pub const fn with_connectivity(mut self, include: bool) -> Self {
        self.include_connectivity = include;
        self
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn reserve_for(&self, total: usize) -> usize {
        if !self.include_connectivity || total <= self.max_nodes {
            return 0;
        }
        let ratio = self.bridge_reserve_ratio.clamp(0.0, 0.5);
        ((self.max_nodes as f64) * ratio).floor() as usize
    }
}

/// Selection summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportanceMetadata {
    /// Entities in the snapshot.
    pub total_entities_in_system: usize,
    /// Entities returned.
    pub selected_entity_count: usize,
    /// `selected / total * 100` (0 for an empty graph).
    pub coverage_percentage: f64,
    /// Lowest importance among ranked (non-bridge) selections.
    pub importance_threshold: f64,
    /// Entities added to reconnect components.
    pub bridge_entity_count: usize,
    /// Components of the ranked selection before repair.
    pub components_before_repair: usize,
    /// Components of the returned selection.
    pub connectivity: ComponentStats,
}

/// Entities and relationships chosen for the importance layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportanceLayer {
    /// Selected entities: ranked selections first, then bridges, then backfill.
    pub entities: Vec<Entity>,
    /// Relationships with both endpoints selected.
    pub relationships: Vec<Relationship>,
    /// Selection summary.
    pub metadata: ImportanceMetadata,
}

/// Selects the importance layer.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn select_important_entities(
    entities: &[Entity],
    relationships: &[Relationship],
    options: &ImportanceOptions,
) -> ImportanceLayer {
    let total = entities.len();

    let mut ranked: Vec<&Entity> = entities.iter().collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    let reserve = options.reserve_for(total);
    let primary_len = total.min(options.max_nodes.saturating_sub(reserve));
    let mut ranked_selected: Vec<&Entity> = ranked[..primary_len].to_vec();

    let components_before = if options.include_connectivity {
        component_count(&ranked_selected, relationships)
    } else {
        0
    };

    let bridges = if options.include_connectivity && components_before > 1 && reserve > 0 {
        find_bridges(&ranked, &ranked_selected, relationships, reserve)
    } else {
        Vec::new()
    };

    // Backfill unspent reserve in rank order.
    let unspent = reserve - bridges.len();
    if unspent > 0 {
        let taken: HashSet<&str> = bridges.iter().map(|e| e.name.as_str()).collect();
        ranked_selected.extend(
            ranked[primary_len..]
                .iter()
                .filter(|e| !taken.contains(e.name.as_str()))
                .take(unspent),
        );
    }

    let importance_threshold = ranked_selected
        .iter()
        .map(|e| e.importance)
        .reduce(f64::min)
        .unwrap_or(0.0);

    let bridge_count = bridges.len();
    let mut selected: Vec<&Entity> = ranked_selected;
    selected.extend(bridges);

    let names: HashSet<&str> = selected.iter().map(|e| e.name.as_str()).collect();
    let selected_relationships: Vec<Relationship> = relationships
        .iter()
        .filter(|r| names.contains(r.from_entity.as_str()) && names.contains(r.to_entity.as_str()))
        .cloned()
        .collect();

    let node_names: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
    let components = connected_components(&node_names, &selected_relationships);
    let connectivity = ComponentStats::from_components(&components);

    let coverage_percentage = if total == 0 {
        0.0
    } else {
        selected.len() as f64 / total as f64 * 100.0
    };

    if bridge_count > 0 {
        tracing::debug!(
            bridges = bridge_count,
            components_before,
            components_after = connectivity.component_count,
            "Connectivity repair added bridge entities"
        );
    }

    ImportanceLayer {
        metadata: ImportanceMetadata {
            total_entities_in_system: total,
            selected_entity_count: selected.len(),
            coverage_percentage,
            importance_threshold,
            bridge_entity_count: bridge_count,
            components_before_repair: components_before,
            connectivity,
        },
        entities: selected.into_iter().cloned().collect(),
        relationships: selected_relationships,
    }
}

fn component_count(selected: &[&Entity], relationships: &[Relationship]) -> usize {
    let nodes: Vec<&str> = selected.iter().map(|e| e.name.as_str()).collect();
    connected_components(&nodes, relationships).len()
}

/// Greedily picks single-entity bridges until the selection is connected,
/// the budget is spent, or no entity touches two components.
fn find_bridges<'a>(
    ranked: &[&'a Entity],
    selected: &[&'a Entity],
    relationships: &[Relationship],
    budget: usize,
) -> Vec<&'a Entity> {
    let rank_of: HashMap<&str, usize> = ranked
        .iter()
        .enumerate()
        .map(|(i, e)| (e.name.as_str(), i))
        .collect();

    let mut current: Vec<&'a Entity> = selected.to_vec();
    let mut bridges = Vec::new();

    while bridges.len() < budget {
        let nodes: Vec<&str> = current.iter().map(|e| e.name.as_str()).collect();
        let components = connected_components(&nodes, relationships);
        if components.len() <= 1 {
            break;
        }

        let component_of: HashMap<&str, usize> = components
            .iter()
            .enumerate()
            .flat_map(|(i, members)| members.iter().map(move |m| (m.as_str(), i)))
            .collect();

        // Unselected entity -> selected components it touches.
        let mut touches: HashMap<&str, BTreeSet<usize>> = HashMap::new();
        for rel in relationships.iter().filter(|r| !r.is_self_loop()) {
            let (a, b) = (rel.from_entity.as_str(), rel.to_entity.as_str());
            for (inside, outside) in [(a, b), (b, a)] {
                if let (Some(&comp), false, true) = (
                    component_of.get(inside),
                    component_of.contains_key(outside),
                    rank_of.contains_key(outside),
                ) {
                    touches.entry(outside).or_default().insert(comp);
                }
            }
        }

        let best = touches
            .iter()
            .filter(|(_, comps)| comps.len() >= 2)
            .filter_map(|(name, comps)| rank_of.get(name).map(|&rank| (comps.len(), rank)))
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let Some((_, rank)) = best else {
            break;
        };
        bridges.push(ranked[rank]);
        current.push(ranked[rank]);
    }

    bridges
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::models::graph::RawEntity;
    use crate::services::entity_metrics::calculate_entity_metrics;

    fn graph(names: &[&str], pairs: &[(&str, &str)]) -> (Vec<Entity>, Vec<Relationship>) {
        let raw: Vec<RawEntity> = names.iter().map(|n| RawEntity::named(*n)).collect();
        let rels: Vec<Relationship> = pairs
            .iter()
            .enumerate()
            .map(|(i, (a, b))| Relationship::new(i64::try_from(i).unwrap(), *a, *b))
            .collect();
        (calculate_entity_metrics(&raw, &rels, &[]), rels)
    }

    fn names(layer: &ImportanceLayer) -> Vec<&str> {
        layer.entities.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_empty_graph() {
        let layer = select_important_entities(&[], &[], &ImportanceOptions::default());
        assert!(layer.entities.is_empty());
        assert!(layer.relationships.is_empty());
        assert_eq!(layer.metadata.total_entities_in_system, 0);
        assert_eq!(layer.metadata.coverage_percentage, 0.0);
    }

    #[test]
    fn test_everything_fits() {
        let (entities, rels) = graph(&["A", "B", "C", "D"], &[("A", "B"), ("A", "C"), ("A", "D")]);
        let layer = select_important_entities(&entities, &rels, &ImportanceOptions::default());
        assert_eq!(layer.metadata.selected_entity_count, 4);
        assert_eq!(layer.metadata.coverage_percentage, 100.0);
        assert_eq!(layer.entities[0].name, "A");
        assert_eq!(layer.relationships.len(), 3);
        assert!(layer.metadata.connectivity.is_connected());
    }

    #[test]
    fn test_budget_without_connectivity() {
        let (entities, rels) = graph(&["A", "B", "C", "D"], &[("A", "B"), ("A", "C"), ("A", "D")]);
        let options = ImportanceOptions::with_max_nodes(2).with_connectivity(false);
        let layer = select_important_entities(&entities, &rels, &options);
        assert_eq!(layer.metadata.selected_entity_count, 2);
        assert_eq!(layer.metadata.coverage_percentage, 50.0);
        assert_eq!(layer.entities[0].name, "A");
        assert_eq!(layer.relationships.len(), 1);
        assert!((layer.metadata.importance_threshold - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(layer.metadata.components_before_repair, 0);
    }

    #[test]
    fn test_bridge_reconnects_two_hubs() {
        // Two hub groups joined only through X, which ranks below every leaf.
        let leaves: Vec<String> = (0..8).map(|i| format!("L{i}")).collect();
        let mut pairs = vec![("H1", "X"), ("X", "H2")];
        for (i, leaf) in leaves.iter().enumerate() {
            pairs.push((if i < 4 { "H1" } else { "H2" }, leaf.as_str()));
        }
        for pair in leaves.chunks(2) {
            pairs.push((pair[0].as_str(), pair[1].as_str()));
        }
        let mut all: Vec<&str> = vec!["H1", "H2"];
        all.extend(leaves.iter().map(String::as_str));
        all.push("X");
        let (entities, rels) = graph(&all, &pairs);

        let options = ImportanceOptions {
            max_nodes: 10,
            include_connectivity: true,
            bridge_reserve_ratio: 0.1,
        };
        let layer = select_important_entities(&entities, &rels, &options);

        assert!(names(&layer).contains(&"X"));
        assert_eq!(layer.metadata.bridge_entity_count, 1);
        assert_eq!(layer.metadata.selected_entity_count, 10);
        assert!(layer.metadata.components_before_repair > 1);
    }

    #[test]
    fn test_unspent_reserve_is_backfilled() {
        // Already connected star larger than the budget.
        let leaves: Vec<String> = (0..12).map(|i| format!("L{i}")).collect();
        let pairs: Vec<(&str, &str)> = leaves.iter().map(|l| ("hub", l.as_str())).collect();
        let mut all = vec!["hub"];
        all.extend(leaves.iter().map(String::as_str));
        let (entities, rels) = graph(&all, &pairs);

        let layer = select_important_entities(
            &entities,
            &rels,
            &ImportanceOptions {
                max_nodes: 10,
                include_connectivity: true,
                bridge_reserve_ratio: 0.2,
            },
        );
        assert_eq!(layer.metadata.selected_entity_count, 10);
        assert_eq!(layer.metadata.bridge_entity_count, 0);
    }

    #[test]
    fn test_budget_respected_when_no_bridge_exists() {
        let (entities, rels) = graph(
            &["A", "B", "C", "D", "E", "F"],
            &[("A", "B"), ("C", "D"), ("E", "F")],
        );
        let layer = select_important_entities(
            &entities,
            &rels,
            &ImportanceOptions {
                max_nodes: 4,
                include_connectivity: true,
                bridge_reserve_ratio: 0.5,
            },
        );
        assert_eq!(layer.metadata.selected_entity_count, 4);
        assert_eq!(layer.metadata.bridge_entity_count, 0);
    }
}
