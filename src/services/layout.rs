//! Graph layout collaborator and layout cache.
//!
//! Positioning nodes is delegated to a [`LayoutEngine`]. kgview only shapes
//! its input, caches its output, and passes it through to callers.
//!
//! | Type | Role |
//! |------|------|
//! | [`LayoutEngine`] | Computes positions for nodes and edges |
//! | [`CircularLayout`] | Deterministic engine grouping communities on rings |
//! | [`LayoutCache`] | Per-collection LRU of layout outputs keyed by description |

use crate::Result;
use crate::models::graph::{Entity, Relationship};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

/// Cache key for the importance layout with a given budget.
///
/// Layers selected without connectivity repair get a `_plain` suffix, since
/// they hold different entities than the repaired layer of the same budget.
#[must_use]
pub fn importance_layout_key(max_nodes: usize, include_connectivity: bool) -> String {
    if include_connectivity {
        format!("entity_importance_{max_nodes}")
    } else {
        format!("entity_importance_{max_nodes}_plain")
    }
}

/// A node handed to the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    /// Entity ID.
    pub id: String,
    /// Entity name.
    pub name: String,
    /// Importance (0.0 to 1.0).
    pub importance: f64,
    /// Community assignment.
    pub community_id: String,
    /// Display size.
    pub size: f64,
}

impl From<&Entity> for LayoutNode {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            name: entity.name.clone(),
            importance: entity.importance,
            community_id: entity.community_id.clone(),
            size: entity.size,
        }
    }
}

/// An edge handed to the layout engine, by entity name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    /// Source entity name.
    pub from: String,
    /// Target entity name.
    pub to: String,
    /// Relationship confidence.
    pub confidence: f64,
}

impl From<&Relationship> for LayoutEdge {
    fn from(rel: &Relationship) -> Self {
        Self {
            from: rel.from_entity.clone(),
            to: rel.to_entity.clone(),
            confidence: rel.confidence,
        }
    }
}

/// Position assigned to one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    /// Node ID.
    pub id: String,
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// Display color, if the engine assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Output of a layout computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOutput {
    /// Node positions.
    pub positions: Vec<NodePosition>,
    /// Mean distance between each node and its nearest neighbor.
    pub avg_spacing: f64,
    /// Distinct communities laid out.
    pub community_count: usize,
}

/// Builds layout input from entities and relationships.
#[must_use]
pub fn layout_input(
    entities: &[Entity],
    relationships: &[Relationship],
) -> (Vec<LayoutNode>, Vec<LayoutEdge>) {
    (
        entities.iter().map(LayoutNode::from).collect(),
        relationships.iter().map(LayoutEdge::from).collect(),
    )
}

/// Trait for layout engines.
///
/// Implementations must be thread-safe; the graph cache calls them while
/// building snapshots and the query service calls them per request.
pub trait LayoutEngine: Send + Sync {
    /// Computes positions for `nodes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot be computed.
    fn compute(&self, nodes: &[LayoutNode], edges: &[LayoutEdge]) -> Result<LayoutOutput>;
}

/// Places each community on its own ring, rings spread along a circle.
///
/// More important nodes sit closer to their ring center.
#[derive(Debug, Clone, Copy)]
pub struct CircularLayout {
    radius: f64,
}

/// Outer radius used by [`CircularLayout::default`].
pub const DEFAULT_LAYOUT_RADIUS: f64 = 500.0;

impl Default for CircularLayout {
    fn default() -> Self {
        Self::new(DEFAULT_LAYOUT_RADIUS)
    }
}

impl CircularLayout {
    /// Creates a layout with the given outer radius.
    #[must_use]
    pub const fn new(radius: f64) -> Self {
        Self { radius }
    }
}

impl LayoutEngine for CircularLayout {
    #[allow(clippy::cast_precision_loss)]
    fn compute(&self, nodes: &[LayoutNode], _edges: &[LayoutEdge]) -> Result<LayoutOutput> {
        let mut communities: BTreeMap<&str, Vec<&LayoutNode>> = BTreeMap::new();
        for node in nodes {
            communities.entry(node.community_id.as_str()).or_default().push(node);
        }

        let ring_count = communities.len().max(1) as f64;
        let ring_radius = self.radius / ring_count.sqrt().max(1.0) / 2.0;
        let mut positions = Vec::with_capacity(nodes.len());

        for (ring, members) in communities.values().enumerate() {
            let angle = std::f64::consts::TAU * ring as f64 / ring_count;
            let (cx, cy) = if communities.len() == 1 {
                (0.0, 0.0)
            } else {
                (self.radius * angle.cos(), self.radius * angle.sin())
            };

            for (i, node) in members.iter().enumerate() {
                let theta = std::f64::consts::TAU * i as f64 / members.len() as f64;
                let r = ring_radius * (1.0 - 0.5 * node.importance.clamp(0.0, 1.0));
                positions.push(NodePosition {
                    id: node.id.clone(),
                    x: r.mul_add(theta.cos(), cx),
                    y: r.mul_add(theta.sin(), cy),
                    color: Some(community_color(ring)),
                });
            }
        }

        Ok(LayoutOutput {
            avg_spacing: average_nearest_spacing(&positions),
            community_count: communities.len(),
            positions,
        })
    }
}

fn community_color(index: usize) -> String {
    const PALETTE: [&str; 8] = [
        "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    ];
    PALETTE[index % PALETTE.len()].to_string()
}

#[allow(clippy::cast_precision_loss)]
fn average_nearest_spacing(positions: &[NodePosition]) -> f64 {
    if positions.len() < 2 {
        return 0.0;
    }
    let total: f64 = positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            positions
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, q)| (p.x - q.x).hypot(p.y - q.y))
                .fold(f64::INFINITY, f64::min)
        })
        .sum();
    total / positions.len() as f64
}

/// LRU of layout outputs for one collection.
///
/// Every [`clear`](Self::clear) starts a new epoch. A layout computed from
/// data read before a clear is stored with
/// [`put_if_current`](Self::put_if_current) and the epoch observed before
/// the read; the insert is dropped if a clear happened in between.
///
/// Lock poisoning is handled fail-open: lookups miss and inserts are
/// skipped, so a poisoned cache only costs recomputation.
pub struct LayoutCache {
    inner: RwLock<LayoutEntries>,
}

struct LayoutEntries {
    entries: LruCache<String, Arc<LayoutOutput>>,
    epoch: u64,
}

impl LayoutCache {
    /// Creates a cache holding up to `capacity` layouts (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: RwLock::new(LayoutEntries {
                entries: LruCache::new(capacity),
                epoch: 0,
            }),
        }
    }

    /// Returns the current epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.read().map_or(u64::MAX, |inner| inner.epoch)
    }

    /// Returns the cached layout for `key`, marking it recently used.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<LayoutOutput>> {
        let mut inner = self.inner.write().ok()?;
        inner.entries.get(key).cloned()
    }

    /// Stores a layout under `key`.
    pub fn put(&self, key: impl Into<String>, layout: Arc<LayoutOutput>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.entries.put(key.into(), layout);
        } else {
            tracing::warn!("Layout cache lock poisoned, skipping insert");
        }
    }

    /// Stores a layout under `key` unless the cache was cleared since `epoch`.
    ///
    /// Returns true if the layout was stored.
    pub fn put_if_current(
        &self,
        key: impl Into<String>,
        layout: Arc<LayoutOutput>,
        epoch: u64,
    ) -> bool {
        let Ok(mut inner) = self.inner.write() else {
            tracing::warn!("Layout cache lock poisoned, skipping insert");
            return false;
        };
        if inner.epoch != epoch {
            tracing::debug!(
                epoch,
                current = inner.epoch,
                "Layout computed before invalidation, not cached"
            );
            return false;
        }
        inner.entries.put(key.into(), layout);
        true
    }

    /// Removes every cached layout and starts a new epoch.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.entries.clear();
            inner.epoch += 1;
        }
    }

    /// Number of cached layouts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map_or(0, |inner| inner.entries.len())
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
