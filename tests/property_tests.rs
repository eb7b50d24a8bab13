//! Property-based tests for the graph algorithms.
//!
//! Uses proptest to verify invariants across random graphs:
//! - Importance is normalised to [0, 1] with a maximum of exactly 1
//! - Metric derivation is deterministic
//! - Neighborhoods respect depth and node bounds
//! - Neighborhood relationships are unique and internal
//! - Importance selection respects its budget and reports coverage
//! - Component statistics account for every entity
//! - Timeline deduplication keeps one highest-priority activity per key

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::cast_precision_loss)]

use chrono::{DateTime, TimeZone, Utc};
use kgview::models::graph::{Community, Entity, RawEntity, Relationship};
use kgview::models::topic::{ActivityType, TopicActivity};
use kgview::services::{
    ImportanceOptions, analyze_connectivity, calculate_entity_metrics, find_neighborhood,
    select_important_entities,
};
use kgview::services::timeline::dedupe_activities;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};

/// Random graph over `E0..En` with edges given as index pairs.
fn graph() -> impl Strategy<Value = (Vec<RawEntity>, Vec<Relationship>)> {
    (1usize..40).prop_flat_map(|n| {
        prop::collection::vec((0..n, 0..n), 0..(n * 3)).prop_map(move |pairs| {
            let entities = (0..n).map(|i| RawEntity::named(format!("E{i}"))).collect();
            let relationships = pairs
                .into_iter()
                .enumerate()
                .map(|(row, (a, b))| {
                    Relationship::new(
                        i64::try_from(row).unwrap(),
                        format!("E{a}"),
                        format!("E{b}"),
                    )
                })
                .collect();
            (entities, relationships)
        })
    })
}

/// Activities drawn from a small key space so collisions are common.
fn activities() -> impl Strategy<Value = Vec<TopicActivity>> {
    let activity = (0usize..3, 0i64..3, prop::sample::select(ActivityType::all().to_vec()))
        .prop_map(|(url, day, activity_type)| TopicActivity {
            timestamp: timestamp(day),
            activity_type,
            url: format!("https://example.com/{url}"),
            title: String::new(),
            domain: "example.com".to_string(),
            relevance: 0.5,
            snippet: None,
            knowledge_chunk: None,
            metadata: None,
        });
    prop::collection::vec(activity, 0..30)
}

fn timestamp(day: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + day * 86_400, 0).unwrap()
}

fn metrics(raw: &[RawEntity], relationships: &[Relationship]) -> Vec<Entity> {
    calculate_entity_metrics(raw, relationships, &[] as &[Community])
}

/// Hop distances from `start`, ignoring self-loops.
fn distances(start: &str, relationships: &[Relationship]) -> HashMap<String, usize> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for rel in relationships.iter().filter(|r| !r.is_self_loop()) {
        adjacency.entry(&rel.from_entity).or_default().push(&rel.to_entity);
        adjacency.entry(&rel.to_entity).or_default().push(&rel.from_entity);
    }
    let mut dist = HashMap::from([(start.to_string(), 0)]);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        let d = dist[node];
        for &next in adjacency.get(node).into_iter().flatten() {
            if !dist.contains_key(next) {
                dist.insert(next.to_string(), d + 1);
                queue.push_back(next);
            }
        }
    }
    dist
}

proptest! {
    /// Property: importance lies in [0, 1] and the maximum is 1 when any edge exists.
    #[test]
    fn prop_importance_normalised((raw, rels) in graph()) {
        let entities = metrics(&raw, &rels);
        prop_assert!(entities.iter().all(|e| (0.0..=1.0).contains(&e.importance)));

        let max = entities.iter().map(|e| e.importance).fold(0.0_f64, f64::max);
        if entities.iter().any(|e| e.degree > 0) {
            prop_assert!((max - 1.0).abs() < 1e-12);
        } else {
            prop_assert!(max.abs() < f64::EPSILON);
        }
    }

    /// Property: metric derivation is deterministic.
    #[test]
    fn prop_metrics_deterministic((raw, rels) in graph()) {
        prop_assert_eq!(metrics(&raw, &rels), metrics(&raw, &rels));
    }

    /// Property: neighbors lie within the depth bound and under the node budget.
    #[test]
    fn prop_neighborhood_bounds(
        (raw, rels) in graph(),
        depth in 0usize..4,
        max_nodes in 0usize..20,
    ) {
        let entities = metrics(&raw, &rels);
        let hood = find_neighborhood("E0", &entities, &rels, depth, max_nodes);
        prop_assert!(hood.center_entity.is_some());
        prop_assert!(hood.neighbors.len() <= max_nodes);

        let dist = distances("E0", &rels);
        for neighbor in &hood.neighbors {
            prop_assert_ne!(neighbor.name.as_str(), "E0");
            let d = dist.get(&neighbor.name).copied();
            prop_assert!(matches!(d, Some(d) if (1..=depth).contains(&d)));
        }
    }

    /// Property: neighborhood relationships are unique by row ID and stay inside the result.
    #[test]
    fn prop_neighborhood_relationships_internal((raw, rels) in graph(), depth in 1usize..4) {
        let entities = metrics(&raw, &rels);
        let hood = find_neighborhood("E0", &entities, &rels, depth, 50);

        let mut members: HashSet<&str> = hood.neighbors.iter().map(|e| e.name.as_str()).collect();
        members.insert("E0");
        let mut rows = HashSet::new();
        for rel in &hood.relationships {
            prop_assert!(rows.insert(rel.row_id));
            prop_assert!(members.contains(rel.from_entity.as_str()));
            prop_assert!(members.contains(rel.to_entity.as_str()));
        }
    }

    /// Property: importance selection respects its budget and reports coverage.
    #[test]
    fn prop_importance_layer_budget(
        (raw, rels) in graph(),
        max_nodes in 1usize..30,
        include_connectivity in any::<bool>(),
    ) {
        let entities = metrics(&raw, &rels);
        let options = ImportanceOptions::with_max_nodes(max_nodes)
            .with_connectivity(include_connectivity);
        let layer = select_important_entities(&entities, &rels, &options);

        let expected = entities.len().min(max_nodes);
        prop_assert_eq!(layer.entities.len(), expected);
        prop_assert_eq!(layer.metadata.selected_entity_count, expected);
        prop_assert_eq!(layer.metadata.total_entities_in_system, entities.len());
        let coverage = expected as f64 / entities.len() as f64 * 100.0;
        prop_assert!((layer.metadata.coverage_percentage - coverage).abs() < 1e-9);

        let names: HashSet<&str> = layer.entities.iter().map(|e| e.name.as_str()).collect();
        prop_assert_eq!(names.len(), layer.entities.len());
        for rel in &layer.relationships {
            prop_assert!(names.contains(rel.from_entity.as_str()));
            prop_assert!(names.contains(rel.to_entity.as_str()));
        }
    }

    /// Property: component sizes add up to the entity count.
    #[test]
    fn prop_components_cover_entities((raw, rels) in graph()) {
        let entities = metrics(&raw, &rels);
        let stats = analyze_connectivity(&entities, &rels);

        prop_assert!(stats.component_count >= 1);
        prop_assert!(stats.largest_component_size <= entities.len());
        let total = stats.average_component_size * stats.component_count as f64;
        prop_assert!((total - entities.len() as f64).abs() < 1e-6);
    }

    /// Property: dedup leaves one activity per (url, timestamp), of the highest priority.
    #[test]
    fn prop_timeline_dedup(input in activities()) {
        let mut best: HashMap<(String, DateTime<Utc>), u8> = HashMap::new();
        for a in &input {
            let entry = best.entry((a.url.clone(), a.timestamp)).or_insert(0);
            *entry = (*entry).max(a.activity_type.priority());
        }

        let output = dedupe_activities(input);
        prop_assert_eq!(output.len(), best.len());
        let mut seen = HashSet::new();
        for a in &output {
            let key = (a.url.clone(), a.timestamp);
            prop_assert_eq!(a.activity_type.priority(), best[&key]);
            prop_assert!(seen.insert(key));
        }
    }
}
