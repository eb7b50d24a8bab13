//! Graph query service.
//!
//! The operation facade used by request handlers. Every operation:
//!
//! 1. Ensures the collection's cache is fresh
//! 2. Runs one algorithm against the cached snapshot
//! 3. Shapes the result for display (relationship sources are truncated)
//!
//! Operations never return `Err`. Each response carries `success` and an
//! optional `error` string and degrades to empty lists and zero counts, so
//! callers must check `error` rather than rely on failures propagating.
//! A stale snapshot (the last rebuild failed) is still served, with
//! `cache_valid: false` and the rebuild error in `error`.
//!
//! | Operation | Algorithm |
//! |-----------|-----------|
//! | `entity_neighborhood` | bounded BFS, optional search enrichment |
//! | `global_importance_layer` | importance selection with bridge repair |
//! | `importance_layout` | importance selection + cached layout |
//! | `topic_timelines` | timeline builder with topic expansion |
//! | `topic_graph` | topic hierarchy and relationships from the store |
//! | `graph_stats` | counts, connectivity, top entities |
//! | `rebuild_graph` / `clear_graph` | store trigger, then invalidation |

use crate::config::GraphConfig;
use crate::models::graph::{CollectionId, Entity, Relationship};
use crate::models::topic::{
    TimelineMetadata, TimelineQuery, TopicHierarchyNode, TopicRelationship, TopicTimeline,
};
use crate::services::connectivity::{ComponentStats, analyze_connectivity};
use crate::services::graph_cache::{CacheView, GraphCacheService, GraphSnapshot};
use crate::services::importance::{
    ImportanceMetadata, ImportanceOptions, select_important_entities,
};
use crate::services::layout::{LayoutOutput, importance_layout_key, layout_input};
use crate::services::neighborhood::find_neighborhood;
use crate::services::search::{EntitySearch, SearchEnrichment};
use crate::services::timeline::build_timelines;
use crate::storage::GraphStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Number of entities listed in graph statistics.
const STATS_TOP_ENTITIES: usize = 10;

// ============================================================================
// Requests
// ============================================================================

/// Neighborhood request. Unset bounds use configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodQuery {
    /// Entity name or ID (case-insensitive).
    pub entity_id: String,
    /// Maximum BFS depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Maximum neighbors returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
}

impl NeighborhoodQuery {
    /// Creates a request for `entity_id`.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    /// Sets the depth bound.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the neighbor budget.
    #[must_use]
    pub const fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = Some(max);
        self
    }
}

/// Importance layer request. Unset fields use configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportanceQuery {
    /// Entity budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
    /// Whether to repair connectivity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_connectivity: Option<bool>,
}

impl ImportanceQuery {
    /// Creates a request with the given budget.
    #[must_use]
    pub const fn with_max_nodes(max_nodes: usize) -> Self {
        Self {
            max_nodes: Some(max_nodes),
            include_connectivity: None,
        }
    }

    /// Sets the connectivity flag.
    #[must_use]
    pub const fn with_connectivity(mut self, include: bool) -> Self {
        self.include_connectivity = Some(include);
        self
    }

    fn options(&self, config: &GraphConfig) -> ImportanceOptions {
        ImportanceOptions {
            max_nodes: self.max_nodes.unwrap_or(config.importance_max_nodes),
            include_connectivity: self
                .include_connectivity
                .unwrap_or(config.include_connectivity),
            bridge_reserve_ratio: config.bridge_reserve_ratio,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Response of write triggers and lifecycle operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResponse {
    fn from_result(result: crate::Result<()>) -> Self {
        match result {
            Ok(()) => Self {
                success: true,
                error: None,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Neighborhood response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodResponse {
    /// Whether a center entity was found and traversed.
    pub success: bool,
    /// Failure or staleness description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Resolved center entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_entity: Option<Entity>,
    /// Entities within the bounds.
    pub neighbors: Vec<Entity>,
    /// Relationships among center and neighbors.
    pub relationships: Vec<Relationship>,
    /// Search context for the center, or fallback results when not found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<SearchEnrichment>,
    /// Whether the snapshot was current.
    pub cache_valid: bool,
}

/// Importance layer response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportanceResponse {
    /// Whether a snapshot was available.
    pub success: bool,
    /// Failure or staleness description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Selected entities.
    pub entities: Vec<Entity>,
    /// Relationships among selected entities.
    pub relationships: Vec<Relationship>,
    /// Selection summary.
    pub metadata: ImportanceMetadata,
    /// Whether the snapshot was current.
    pub cache_valid: bool,
}

/// Importance layout response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResponse {
    /// Whether a layout was produced.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Layout cache key.
    pub cache_key: String,
    /// Whether the layout came from the layout cache.
    pub cached: bool,
    /// Computed layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutOutput>,
    /// Selection summary of the laid-out entities.
    pub metadata: ImportanceMetadata,
}

/// Topic timeline response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
    /// Whether the timelines were built.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timelines, most active first.
    pub timelines: Vec<TopicTimeline>,
    /// Summary across timelines.
    pub metadata: TimelineMetadata,
}

/// Topic graph response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicGraphResponse {
    /// Whether the topic tables were read.
    pub success: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Requested topics and topics at the far end of returned relationships.
    pub topics: Vec<TopicHierarchyNode>,
    /// Relationships at or above the strength threshold.
    pub relationships: Vec<TopicRelationship>,
}

/// Graph statistics response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStatsResponse {
    /// Whether a snapshot was available.
    pub success: bool,
    /// Failure or staleness description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Entities in the snapshot.
    pub entity_count: usize,
    /// Relationships in the snapshot.
    pub relationship_count: usize,
    /// Communities in the snapshot.
    pub community_count: usize,
    /// Whether the snapshot was current.
    pub cache_valid: bool,
    /// Snapshot build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Components of the full graph.
    pub connectivity: ComponentStats,
    /// Most important entities.
    pub top_entities: Vec<Entity>,
}

// ============================================================================
// Service
// ============================================================================

/// Query facade over the graph cache.
pub struct GraphQueryService {
    cache: Arc<GraphCacheService>,
    search: Option<Arc<dyn EntitySearch>>,
}

impl GraphQueryService {
    /// Creates a service with its own cache.
    #[must_use]
    pub fn new(config: GraphConfig) -> Self {
        Self::with_cache(Arc::new(GraphCacheService::new(config)))
    }

    /// Creates a service over a shared cache.
    #[must_use]
    pub const fn with_cache(cache: Arc<GraphCacheService>) -> Self {
        Self {
            cache,
            search: None,
        }
    }

    /// Sets the search collaborator.
    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn EntitySearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Returns the underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<GraphCacheService> {
        &self.cache
    }

    fn config(&self) -> &GraphConfig {
        self.cache.config()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Opens `collection` over `store`.
    pub fn open_collection(
        &self,
        collection: CollectionId,
        store: Arc<dyn GraphStore>,
    ) -> OperationResponse {
        OperationResponse::from_result(self.cache.open_collection(collection, store))
    }

    /// Closes `collection`, dropping its cache.
    pub fn close_collection(&self, collection: &CollectionId) -> OperationResponse {
        match self.cache.close_collection(collection) {
            Ok(true) => OperationResponse::from_result(Ok(())),
            Ok(false) => OperationResponse::from_result(Err(crate::Error::CollectionNotOpen(
                collection.to_string(),
            ))),
            Err(e) => OperationResponse::from_result(Err(e)),
        }
    }

    /// Forces the next query on `collection` to rebuild its cache.
    pub fn invalidate(&self, collection: &CollectionId) -> bool {
        self.cache.invalidate(collection)
    }

    /// Rebuilds the store's graph tables, then invalidates the cache.
    #[instrument(name = "kgview.query.rebuild_graph", skip(self), fields(collection = %collection))]
    pub fn rebuild_graph(&self, collection: &CollectionId) -> OperationResponse {
        self.run_trigger(collection, "rebuild_graph", |store| store.build_graph())
    }

    /// Clears the store's graph tables, then invalidates the cache.
    #[instrument(name = "kgview.query.clear_graph", skip(self), fields(collection = %collection))]
    pub fn clear_graph(&self, collection: &CollectionId) -> OperationResponse {
        self.run_trigger(collection, "clear_graph", |store| store.clear())
    }

    fn run_trigger(
        &self,
        collection: &CollectionId,
        operation: &'static str,
        trigger: impl FnOnce(&dyn GraphStore) -> crate::Result<()>,
    ) -> OperationResponse {
        let start = Instant::now();
        let result = self.cache.store(collection).and_then(|store| {
            let outcome = trigger(store.as_ref());
            // Invalidate even on failure: a partial write is still a write.
            self.cache.invalidate(collection);
            outcome
        });
        if let Err(e) = &result {
            tracing::warn!(collection = %collection, operation, error = %e, "Graph trigger failed");
        }
        record_duration(operation, start);
        OperationResponse::from_result(result)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Returns the bounded neighborhood of an entity.
    #[instrument(
        name = "kgview.query.neighborhood",
        skip(self, query),
        fields(collection = %collection, entity = %query.entity_id)
    )]
    pub fn entity_neighborhood(
        &self,
        collection: &CollectionId,
        query: &NeighborhoodQuery,
    ) -> NeighborhoodResponse {
        let start = Instant::now();
        let view = self.cache.ensure_fresh(collection);
        let response = match usable_snapshot(&view) {
            Err(error) => NeighborhoodResponse {
                error: Some(error),
                ..NeighborhoodResponse::default()
            },
            Ok(snapshot) => self.neighborhood_from(&snapshot, &view, query),
        };
        record_duration("entity_neighborhood", start);
        response
    }

    fn neighborhood_from(
        &self,
        snapshot: &GraphSnapshot,
        view: &CacheView,
        query: &NeighborhoodQuery,
    ) -> NeighborhoodResponse {
        let config = self.config();
        let result = find_neighborhood(
            &query.entity_id,
            &snapshot.entity_metrics,
            &snapshot.relationships,
            query.max_depth.unwrap_or(config.neighborhood_max_depth),
            query.max_nodes.unwrap_or(config.neighborhood_max_nodes),
        );

        let Some(center) = result.center_entity else {
            return NeighborhoodResponse {
                success: false,
                error: Some(format!("Entity '{}' not found", query.entity_id)),
                enrichment: self.enrich(std::slice::from_ref(&query.entity_id)),
                cache_valid: view.is_valid,
                ..NeighborhoodResponse::default()
            };
        };

        NeighborhoodResponse {
            success: true,
            error: view.error.clone(),
            enrichment: self.enrich(std::slice::from_ref(&center.name)),
            center_entity: Some(center),
            neighbors: result.neighbors,
            relationships: self.for_display(&result.relationships),
            cache_valid: view.is_valid,
        }
    }

    fn enrich(&self, names: &[String]) -> Option<SearchEnrichment> {
        let search = self.search.as_ref()?;
        match search.enrich(names) {
            Ok(enrichment) => Some(enrichment),
            Err(e) => {
                tracing::warn!(error = %e, "Search enrichment failed");
                None
            },
        }
    }

    /// Returns the most important entities under a budget.
    #[instrument(
        name = "kgview.query.importance_layer",
        skip(self, query),
        fields(collection = %collection)
    )]
    pub fn global_importance_layer(
        &self,
        collection: &CollectionId,
        query: &ImportanceQuery,
    ) -> ImportanceResponse {
        let start = Instant::now();
        let view = self.cache.ensure_fresh(collection);
        let response = match usable_snapshot(&view) {
            Err(error) => ImportanceResponse {
                error: Some(error),
                ..ImportanceResponse::default()
            },
            Ok(snapshot) => {
                let layer = select_important_entities(
                    &snapshot.entity_metrics,
                    &snapshot.relationships,
                    &query.options(self.config()),
                );
                ImportanceResponse {
                    success: true,
                    error: view.error.clone(),
                    relationships: self.for_display(&layer.relationships),
                    entities: layer.entities,
                    metadata: layer.metadata,
                    cache_valid: view.is_valid,
                }
            },
        };
        record_duration("global_importance_layer", start);
        response
    }

    /// Returns a layout of the importance layer, cached per budget and
    /// connectivity setting.
    ///
    /// Requires a layout engine on the cache.
    #[instrument(
        name = "kgview.query.importance_layout",
        skip(self, query),
        fields(collection = %collection)
    )]
    pub fn importance_layout(
        &self,
        collection: &CollectionId,
        query: &ImportanceQuery,
    ) -> LayoutResponse {
        let start = Instant::now();
        let options = query.options(self.config());
        let cache_key = importance_layout_key(options.max_nodes, options.include_connectivity);
        let response = self.compute_layout(collection, &options, cache_key.clone());
        record_duration("importance_layout", start);

        response.unwrap_or_else(|error| LayoutResponse {
            error: Some(error),
            cache_key,
            ..LayoutResponse::default()
        })
    }

    fn compute_layout(
        &self,
        collection: &CollectionId,
        options: &ImportanceOptions,
        cache_key: String,
    ) -> std::result::Result<LayoutResponse, String> {
        let engine = self
            .cache
            .layout_engine()
            .ok_or_else(|| "No layout engine configured".to_string())?;

        // Epoch before snapshot: a clear in between must reject this layout.
        let layouts = self.cache.layouts(collection).ok().map(|layouts| {
            let epoch = layouts.epoch();
            (layouts, epoch)
        });

        let view = self.cache.ensure_fresh(collection);
        let snapshot = usable_snapshot(&view)?;
        let layer = select_important_entities(
            &snapshot.entity_metrics,
            &snapshot.relationships,
            options,
        );

        let Some((layouts, epoch)) = layouts else {
            return Err(crate::Error::CollectionNotOpen(collection.to_string()).to_string());
        };
        if view.is_valid
            && let Some(layout) = layouts.get(&cache_key)
        {
            return Ok(LayoutResponse {
                success: true,
                error: None,
                cache_key,
                cached: true,
                layout: Some((*layout).clone()),
                metadata: layer.metadata,
            });
        }

        let (nodes, edges) = layout_input(&layer.entities, &layer.relationships);
        let layout = engine.compute(&nodes, &edges).map_err(|e| e.to_string())?;
        if view.is_valid {
            layouts.put_if_current(cache_key.clone(), Arc::new(layout.clone()), epoch);
        }

        Ok(LayoutResponse {
            success: true,
            error: view.error.clone(),
            cache_key,
            cached: false,
            layout: Some(layout),
            metadata: layer.metadata,
        })
    }

    /// Builds topic timelines.
    ///
    /// Reads the topic tables directly; the graph cache is not involved.
    #[instrument(
        name = "kgview.query.topic_timelines",
        skip(self, query),
        fields(collection = %collection, topics = query.topics.len())
    )]
    pub fn topic_timelines(
        &self,
        collection: &CollectionId,
        query: &TimelineQuery,
    ) -> TimelineResponse {
        let start = Instant::now();
        let result = self
            .cache
            .store(collection)
            .and_then(|store| build_timelines(store.as_ref(), query, self.config()));
        record_duration("topic_timelines", start);

        match result {
            Ok(set) => TimelineResponse {
                success: true,
                error: None,
                timelines: set.timelines,
                metadata: set.metadata,
            },
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "Topic timelines failed");
                TimelineResponse {
                    error: Some(e.to_string()),
                    ..TimelineResponse::default()
                }
            },
        }
    }

    /// Returns hierarchy nodes for `topic_ids` and their relationships of at
    /// least `min_strength`. An empty id list selects every topic.
    #[instrument(
        name = "kgview.query.topic_graph",
        skip(self, topic_ids),
        fields(collection = %collection, topics = topic_ids.len())
    )]
    pub fn topic_graph(
        &self,
        collection: &CollectionId,
        topic_ids: &[String],
        min_strength: f64,
    ) -> TopicGraphResponse {
        let start = Instant::now();
        let result = self.cache.store(collection).and_then(|store| {
            let hierarchy = store.get_topic_hierarchy()?;
            let ids: Vec<String> = if topic_ids.is_empty() {
                hierarchy.iter().map(|n| n.topic_id.clone()).collect()
            } else {
                topic_ids.to_vec()
            };
            let relationships = store.get_relationships_for_topics(&ids, min_strength)?;

            let mut wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            for rel in &relationships {
                wanted.insert(rel.from_topic.as_str());
                wanted.insert(rel.to_topic.as_str());
            }
            let topics: Vec<TopicHierarchyNode> = hierarchy
                .iter()
                .filter(|n| wanted.contains(n.topic_id.as_str()))
                .cloned()
                .collect();
            Ok((topics, relationships))
        });
        record_duration("topic_graph", start);

        match result {
            Ok((topics, relationships)) => TopicGraphResponse {
                success: true,
                error: None,
                topics,
                relationships,
            },
            Err(e) => TopicGraphResponse {
                error: Some(e.to_string()),
                ..TopicGraphResponse::default()
            },
        }
    }

    /// Returns counts, connectivity, and the most important entities.
    #[instrument(name = "kgview.query.graph_stats", skip(self), fields(collection = %collection))]
    pub fn graph_stats(&self, collection: &CollectionId) -> GraphStatsResponse {
        let start = Instant::now();
        let view = self.cache.ensure_fresh(collection);
        let response = match usable_snapshot(&view) {
            Err(error) => GraphStatsResponse {
                error: Some(error),
                ..GraphStatsResponse::default()
            },
            Ok(snapshot) => {
                let mut top: Vec<&Entity> = snapshot.entity_metrics.iter().collect();
                top.sort_by(|a, b| b.importance.total_cmp(&a.importance));
                GraphStatsResponse {
                    success: true,
                    error: view.error.clone(),
                    entity_count: snapshot.entity_metrics.len(),
                    relationship_count: snapshot.relationships.len(),
                    community_count: snapshot.communities.len(),
                    cache_valid: view.is_valid,
                    last_updated: view.last_updated(),
                    connectivity: analyze_connectivity(
                        &snapshot.entity_metrics,
                        &snapshot.relationships,
                    ),
                    top_entities: top.into_iter().take(STATS_TOP_ENTITIES).cloned().collect(),
                }
            },
        };
        record_duration("graph_stats", start);
        response
    }

    fn for_display(&self, relationships: &[Relationship]) -> Vec<Relationship> {
        let limit = self.config().source_display_limit;
        relationships.iter().map(|r| r.for_display(limit)).collect()
    }
}

/// Returns the snapshot to serve, or the reason there is none.
fn usable_snapshot(view: &CacheView) -> std::result::Result<Arc<GraphSnapshot>, String> {
    view.snapshot.clone().ok_or_else(|| {
        view.error
            .clone()
            .unwrap_or_else(|| "Graph cache unavailable".to_string())
    })
}

fn record_duration(operation: &'static str, start: Instant) {
    metrics::histogram!("graph_query_duration_ms", "operation" => operation)
        .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::models::graph::{RawEntity, RawRelationship};
    use crate::models::topic::{TopicAssociation, TopicRelationship};
    use crate::services::layout::CircularLayout;
    use crate::services::search::StoreEntitySearch;
    use crate::storage::InMemoryGraphStore;

    fn collection() -> CollectionId {
        CollectionId::new("history")
    }

    fn hub_store() -> Arc<InMemoryGraphStore> {
        let store = InMemoryGraphStore::new();
        for name in ["A", "B", "C", "D"] {
            store.insert_entity(RawEntity::named(name)).unwrap();
        }
        for (i, to) in ["B", "C", "D"].iter().enumerate() {
            store
                .insert_relationship(
                    RawRelationship::between("A", *to)
                        .with_row_id(i64::try_from(i).unwrap())
                        .with_sources(["s1", "s2", "s3", "s4"]),
                )
                .unwrap();
        }
        Arc::new(store)
    }

    fn service(store: Arc<InMemoryGraphStore>) -> GraphQueryService {
        let service = GraphQueryService::new(GraphConfig::default());
        assert!(service.open_collection(collection(), store).success);
        service
    }

    #[test]
    fn test_unopened_collection_reports_error() {
        let service = GraphQueryService::new(GraphConfig::default());
        let response = service.global_importance_layer(&collection(), &ImportanceQuery::default());
        assert!(!response.success);
        assert!(response.error.unwrap().contains("not open"));
        assert!(response.entities.is_empty());

        assert!(!service.close_collection(&collection()).success);
        assert!(!service.rebuild_graph(&collection()).success);
    }

    #[test]
    fn test_neighborhood_truncates_sources() {
        let service = service(hub_store());
        let response = service.entity_neighborhood(&collection(), &NeighborhoodQuery::new("a"));
        assert!(response.success);
        assert!(response.cache_valid);
        assert_eq!(response.neighbors.len(), 3);
        assert!(response.relationships.iter().all(|r| r.sources.len() == 3));
        assert!(response.enrichment.is_none());
    }

    #[test]
    fn test_neighborhood_miss_uses_search_fallback() {
        let store = hub_store();
        store
            .insert_relationship(RawRelationship::between("Zed Editor", "Rust"))
            .unwrap();
        let service = GraphQueryService::new(GraphConfig::default())
            .with_search(Arc::new(StoreEntitySearch::new(store.clone())));
        service.open_collection(collection(), store);

        let response = service.entity_neighborhood(&collection(), &NeighborhoodQuery::new("zed"));
        assert!(!response.success);
        assert!(response.error.unwrap().contains("not found"));
        assert_eq!(response.enrichment.unwrap().related_entities, vec!["Rust"]);
    }

    #[test]
    fn test_importance_defaults_and_shape() {
        let service = service(hub_store());
        let response = service.global_importance_layer(&collection(), &ImportanceQuery::default());
        assert!(response.success);
        assert_eq!(response.metadata.total_entities_in_system, 4);
        assert_eq!(response.entities[0].name, "A");
        assert_eq!(response.entities[0].importance, 1.0);
    }

    #[test]
    fn test_importance_layout_is_cached_until_invalidated() {
        let cache = Arc::new(
            GraphCacheService::new(GraphConfig::default())
                .with_layout_engine(Arc::new(CircularLayout::default())),
        );
        let service = GraphQueryService::with_cache(cache);
        service.open_collection(collection(), hub_store());

        let query = ImportanceQuery::with_max_nodes(10);
        let first = service.importance_layout(&collection(), &query);
        assert!(first.success);
        assert!(!first.cached);
        assert_eq!(first.cache_key, "entity_importance_10");

        assert!(service.importance_layout(&collection(), &query).cached);

        service.invalidate(&collection());
        assert!(!service.importance_layout(&collection(), &query).cached);
    }

    #[test]
    fn test_importance_layout_keyed_by_connectivity() {
        let cache = Arc::new(
            GraphCacheService::new(GraphConfig::default())
                .with_layout_engine(Arc::new(CircularLayout::default())),
        );
        let service = GraphQueryService::with_cache(cache);
        service.open_collection(collection(), hub_store());

        let plain = ImportanceQuery::with_max_nodes(3).with_connectivity(false);
        let repaired = ImportanceQuery::with_max_nodes(3).with_connectivity(true);

        let first = service.importance_layout(&collection(), &plain);
        assert!(!first.cached);
        assert_eq!(first.cache_key, "entity_importance_3_plain");

        let second = service.importance_layout(&collection(), &repaired);
        assert!(!second.cached);
        assert_eq!(second.cache_key, "entity_importance_3");

        assert!(service.importance_layout(&collection(), &plain).cached);
        assert!(service.importance_layout(&collection(), &repaired).cached);
    }

    #[test]
    fn test_importance_layout_without_engine() {
        let service = service(hub_store());
        let response = service.importance_layout(&collection(), &ImportanceQuery::default());
        assert!(!response.success);
        assert_eq!(response.cache_key, "entity_importance_500");
    }

    #[test]
    fn test_clear_graph_invalidates() {
        let store = hub_store();
        let service = service(store);
        assert_eq!(service.graph_stats(&collection()).entity_count, 4);

        assert!(service.clear_graph(&collection()).success);
        let stats = service.graph_stats(&collection());
        assert!(stats.success);
        assert_eq!(stats.entity_count, 0);
        assert_eq!(stats.connectivity.component_count, 0);
    }

    #[test]
    fn test_graph_stats() {
        let service = service(hub_store());
        let stats = service.graph_stats(&collection());
        assert!(stats.success);
        assert_eq!(stats.relationship_count, 3);
        assert_eq!(stats.connectivity.component_count, 1);
        assert_eq!(stats.top_entities[0].name, "A");
        assert!(stats.last_updated.is_some());
    }

    #[test]
    fn test_topic_timelines_and_graph() {
        let store = hub_store();
        store
            .insert_association(TopicAssociation::new("rust", "https://a.dev", 0.9))
            .unwrap();
        store
            .insert_topic_node(TopicHierarchyNode {
                topic_id: "t1".to_string(),
                topic_name: "rust".to_string(),
                parent_topic_id: None,
                level: 0,
                confidence: 0.9,
            })
            .unwrap();
        store
            .insert_topic_node(TopicHierarchyNode {
                topic_id: "t2".to_string(),
                topic_name: "cargo".to_string(),
                parent_topic_id: Some("t1".to_string()),
                level: 1,
                confidence: 0.8,
            })
            .unwrap();
        store
            .insert_topic_relationship(TopicRelationship {
                from_topic: "t1".to_string(),
                to_topic: "t2".to_string(),
                relationship_type: "parent_of".to_string(),
                strength: 0.7,
            })
            .unwrap();
        let service = service(store);

        let timelines = service.topic_timelines(&collection(), &TimelineQuery::new(["rust"]));
        assert!(timelines.success);
        assert_eq!(timelines.timelines.len(), 1);

        let graph = service.topic_graph(&collection(), &["t1".to_string()], 0.5);
        assert!(graph.success);
        assert_eq!(graph.topics.len(), 2);
        assert_eq!(graph.relationships.len(), 1);

        let weak = service.topic_graph(&collection(), &["t1".to_string()], 0.9);
        assert_eq!(weak.topics.len(), 1);
        assert!(weak.relationships.is_empty());
    }
}
