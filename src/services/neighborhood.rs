//! Bounded neighborhood traversal.
//!
//! Answers "what is near entity X" with a breadth-first search over the
//! cached relationship graph, treating every relationship as undirected.
//!
//! Two bounds apply:
//!
//! - `max_depth`: nodes at this depth are collected but not expanded
//! - `max_nodes`: no further neighbors are collected once this many are held
//!
//! After the search, relationships between any two collected nodes are added
//! so the returned subgraph shows sibling edges, not only the BFS tree.
//! Self-loops take no part in traversal and are never returned.

use crate::models::graph::{Entity, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of a neighborhood traversal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighborhood {
    /// Resolved center entity, `None` when the key matched nothing.
    pub center_entity: Option<Entity>,
    /// Entities reached within the bounds, in discovery order.
    pub neighbors: Vec<Entity>,
    /// Relationships among the center and neighbors, unique by row ID.
    pub relationships: Vec<Relationship>,
}

impl Neighborhood {
    /// Returns true if no center entity was found.
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        self.center_entity.is_none()
    }
}

/// Index over a relationship list: adjacency plus relationships per pair.
struct PairIndex<'a> {
    adjacency: HashMap<&'a str, Vec<&'a str>>,
    pairs: HashMap<(&'a str, &'a str), Vec<&'a Relationship>>,
}

impl<'a> PairIndex<'a> {
    fn build(relationships: &'a [Relationship]) -> Self {
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut pairs: HashMap<(&str, &str), Vec<&Relationship>> = HashMap::new();

        for rel in relationships.iter().filter(|r| !r.is_self_loop()) {
            let (a, b) = (rel.from_entity.as_str(), rel.to_entity.as_str());
            if !pairs.contains_key(&(a, b)) {
                adjacency.entry(a).or_default().push(b);
                adjacency.entry(b).or_default().push(a);
            }
            pairs.entry((a, b)).or_default().push(rel);
            pairs.entry((b, a)).or_default().push(rel);
        }

        Self { adjacency, pairs }
    }

    fn neighbors_of(&self, name: &str) -> &[&'a str] {
        self.adjacency.get(name).map_or(&[][..], Vec::as_slice)
    }

    fn between(&self, a: &'a str, b: &'a str) -> &[&'a Relationship] {
        self.pairs.get(&(a, b)).map_or(&[][..], Vec::as_slice)
    }
}

/// Collects relationships, dropping repeated row IDs.
#[derive(Default)]
struct RelationshipSet {
    seen: HashSet<i64>,
    items: Vec<Relationship>,
}

impl RelationshipSet {
    fn extend<'r>(&mut self, rels: impl IntoIterator<Item = &'r Relationship>) {
        for rel in rels {
            if self.seen.insert(rel.row_id) {
                self.items.push(rel.clone());
            }
        }
    }
}

/// Runs a bounded BFS from the entity matching `entity_key`.
///
/// `entity_key` is compared case-insensitively against entity names and IDs.
/// A key that matches nothing yields an empty result without a center.
/// Relationship endpoints missing from `entities` are skipped.
#[must_use]
pub fn find_neighborhood(
    entity_key: &str,
    entities: &[Entity],
    relationships: &[Relationship],
    max_depth: usize,
    max_nodes: usize,
) -> Neighborhood {
    let Some(center) = entities.iter().find(|e| e.matches_key(entity_key)) else {
        tracing::debug!(entity = %entity_key, "Neighborhood center not found");
        return Neighborhood::default();
    };

    let by_name: HashMap<&str, &Entity> = entities.iter().map(|e| (e.name.as_str(), e)).collect();
    let index = PairIndex::build(relationships);

    let mut visited: HashSet<&str> = HashSet::from([center.name.as_str()]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(center.name.as_str(), 0)]);
    let mut neighbors: Vec<&Entity> = Vec::new();
    let mut found = RelationshipSet::default();

    'bfs: while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for &next in index.neighbors_of(current) {
            if neighbors.len() >= max_nodes {
                break 'bfs;
            }
            if visited.contains(next) {
                continue;
            }
            let Some(&entity) = by_name.get(next) else {
                continue;
            };

            visited.insert(next);
            neighbors.push(entity);
            found.extend(index.between(current, next).iter().copied());
            queue.push_back((next, depth + 1));
        }
    }

    // Densify: add every relationship among the collected nodes.
    let members: Vec<&str> = std::iter::once(center.name.as_str())
        .chain(neighbors.iter().map(|e| e.name.as_str()))
        .collect();
    for (i, &a) in members.iter().enumerate() {
        for &b in &members[i + 1..] {
            found.extend(index.between(a, b).iter().copied());
        }
    }

    tracing::debug!(
        entity = %center.name,
        neighbors = neighbors.len(),
        relationships = found.items.len(),
        "Neighborhood traversal complete"
    );

    Neighborhood {
        center_entity: Some(center.clone()),
        neighbors: neighbors.into_iter().cloned().collect(),
        relationships: found.items,
    }
}
