//! Entity metrics calculation.
//!
//! Derives degree, normalised importance, community assignment, and display
//! size for every entity from a snapshot of graph records.
//!
//! | Metric | Formula |
//! |--------|---------|
//! | `degree` | relationship endpoints naming the entity |
//! | `importance` | `degree / max(maxDegree, 1)` |
//! | `community_id` | last community listing the entity, else `"default"` |
//! | `size` | `clamp(8 + sqrt(degree * 3), 8, 40)` |
//!
//! The calculation is a pure function: identical inputs always produce
//! identical output. Data-quality problems are logged and tolerated.

use crate::models::graph::{
    Community, DEFAULT_COMMUNITY, DEFAULT_CONFIDENCE, Entity, RawEntity, Relationship,
};
use std::collections::HashMap;

/// Smallest display size.
pub const MIN_ENTITY_SIZE: f64 = 8.0;

/// Largest display size.
pub const MAX_ENTITY_SIZE: f64 = 40.0;

/// Computes the display size for a degree.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn entity_size(degree: usize) -> f64 {
    (MIN_ENTITY_SIZE + (degree as f64 * 3.0).sqrt()).clamp(MIN_ENTITY_SIZE, MAX_ENTITY_SIZE)
}

/// Computes derived metrics for every distinct entity.
///
/// Output holds one entity per distinct normalised name, in order of first
/// appearance. Entities without a usable name are skipped. Relationship
/// endpoints missing from the entity set are logged and otherwise ignored.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_entity_metrics(
    raw_entities: &[RawEntity],
    relationships: &[Relationship],
    communities: &[Community],
) -> Vec<Entity> {
    let mut entities: Vec<Entity> = Vec::with_capacity(raw_entities.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(raw_entities.len());

    for raw in raw_entities {
        let Some(name) = raw.normalized_name() else {
            tracing::debug!(id = ?raw.id, "Skipping entity without a name");
            continue;
        };
        if index.contains_key(name) {
            continue;
        }

        let mut entity = Entity::new(name, raw.normalized_type());
        if let Some(id) = raw.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            entity.id = id.to_string();
        }
        entity.confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0);
        entity.count = raw.count.unwrap_or(1);

        index.insert(entity.name.clone(), entities.len());
        entities.push(entity);
    }

    // Last write wins for entities listed by several communities.
    let mut community_of: HashMap<&str, &str> = HashMap::new();
    for community in communities {
        for member in &community.entities {
            community_of.insert(member.trim(), community.id.as_str());
        }
    }

    let mut dangling = 0usize;
    for rel in relationships {
        for endpoint in [&rel.from_entity, &rel.to_entity] {
            if let Some(&i) = index.get(endpoint.as_str()) {
                entities[i].degree += 1;
            } else {
                dangling += 1;
                tracing::debug!(
                    row_id = rel.row_id,
                    endpoint = %endpoint,
                    "Relationship endpoint not in entity set"
                );
            }
        }
    }
    if dangling > 0 {
        tracing::warn!(
            dangling_endpoints = dangling,
            relationships = relationships.len(),
            "Relationships reference entities outside the fetched set"
        );
    }

    let max_degree = entities.iter().map(|e| e.degree).max().unwrap_or(0).max(1);

    for entity in &mut entities {
        entity.importance = entity.degree as f64 / max_degree as f64;
        entity.community_id = community_of
            .get(entity.name.as_str())
            .map_or_else(|| DEFAULT_COMMUNITY.to_string(), |id| (*id).to_string());
        entity.size = entity_size(entity.degree);
    }

    entities
}
