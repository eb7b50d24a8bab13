//! Graph cache service.
//!
//! Holds one derived snapshot per open collection so queries never touch the
//! backing store on the fast path.
//!
//! # Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | `open_collection` | Registers an empty, invalid slot |
//! | first `ensure_fresh` | Fetches from the store, computes metrics, stores the snapshot |
//! | later `ensure_fresh` | Returns the stored snapshot (no I/O) |
//! | `invalidate` | Marks the slot invalid; the next `ensure_fresh` rebuilds |
//! | `close_collection` | Drops the slot and its snapshot |
//!
//! Freshness depends entirely on explicit invalidation. Anything that writes
//! the backing graph tables must call [`GraphCacheService::invalidate`].
//!
//! # Concurrency
//!
//! Snapshots are immutable and shared through `Arc`, so readers see either
//! the old snapshot or the new one in full. Rebuilds are single-flight per
//! collection: concurrent misses queue on a build lock and the waiters reuse
//! the winner's snapshot. A generation counter catches invalidations that
//! land while a build is running; that build is stored but left invalid.
//!
//! # Failures
//!
//! `ensure_fresh` never returns an error. A failed build leaves any previous
//! snapshot in place, marked invalid, and reports the failure in
//! [`CacheView::error`].

use crate::config::GraphConfig;
use crate::models::graph::{CollectionId, Community, Entity, RawEntity, Relationship};
use crate::services::entity_metrics::calculate_entity_metrics;
use crate::services::layout::{LayoutCache, LayoutEngine, LayoutOutput, layout_input};
use crate::storage::GraphStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tracing::instrument;

/// An immutable, derived view of one collection's graph.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    /// Entities as fetched from the store.
    pub entities: Vec<RawEntity>,
    /// Normalised relationships.
    pub relationships: Vec<Relationship>,
    /// Normalised communities.
    pub communities: Vec<Community>,
    /// Entities with derived metrics.
    pub entity_metrics: Vec<Entity>,
    /// Layout over the full entity set, if a layout engine is configured.
    pub preset_layout: Option<Arc<LayoutOutput>>,
    /// When the snapshot was built.
    pub last_updated: DateTime<Utc>,
}

impl GraphSnapshot {
    /// Builds a snapshot from raw store records.
    #[must_use]
    pub fn from_records(
        entities: Vec<RawEntity>,
        relationships: &[crate::models::graph::RawRelationship],
        communities: &[crate::models::graph::RawCommunity],
    ) -> Self {
        let relationships = Relationship::from_raw_list(relationships);
        let communities: Vec<Community> = communities
            .iter()
            .enumerate()
            .map(|(position, raw)| Community::from_raw(raw, position))
            .collect();
        let entity_metrics = calculate_entity_metrics(&entities, &relationships, &communities);

        Self {
            entities,
            relationships,
            communities,
            entity_metrics,
            preset_layout: None,
            last_updated: Utc::now(),
        }
    }
}

/// Result of [`GraphCacheService::ensure_fresh`].
#[derive(Debug, Clone, Default)]
pub struct CacheView {
    /// Latest snapshot, possibly stale when `is_valid` is false.
    pub snapshot: Option<Arc<GraphSnapshot>>,
    /// Whether the snapshot reflects the store as of the last invalidation.
    pub is_valid: bool,
    /// Why the cache could not be refreshed.
    pub error: Option<String>,
}

impl CacheView {
    fn failed(error: &Error) -> Self {
        Self {
            snapshot: None,
            is_valid: false,
            error: Some(error.to_string()),
        }
    }

    /// Returns true if a valid snapshot is available.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        self.is_valid && self.snapshot.is_some()
    }

    /// Entities with metrics, or an empty slice without a snapshot.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        self.snapshot.as_ref().map_or(&[][..], |s| s.entity_metrics.as_slice())
    }

    /// Relationships, or an empty slice without a snapshot.
    #[must_use]
    pub fn relationships(&self) -> &[Relationship] {
        self.snapshot.as_ref().map_or(&[][..], |s| s.relationships.as_slice())
    }

    /// Communities, or an empty slice without a snapshot.
    #[must_use]
    pub fn communities(&self) -> &[Community] {
        self.snapshot.as_ref().map_or(&[][..], |s| s.communities.as_slice())
    }

    /// Build time of the snapshot, if any.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_ref().map(|s| s.last_updated)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<Arc<GraphSnapshot>>,
    is_valid: bool,
    generation: u64,
    last_error: Option<String>,
}

impl CacheState {
    fn view(&self) -> CacheView {
        CacheView {
            snapshot: self.snapshot.clone(),
            is_valid: self.is_valid,
            error: self.last_error.clone(),
        }
    }
}

/// Per-collection cache slot.
struct CollectionSlot {
    store: Arc<dyn GraphStore>,
    state: RwLock<CacheState>,
    build_lock: Mutex<()>,
    layouts: Arc<LayoutCache>,
}

impl CollectionSlot {
    fn read_state(&self) -> Result<std::sync::RwLockReadGuard<'_, CacheState>> {
        self.state.read().map_err(|_| lock_poisoned("read_cache_state"))
    }

    fn write_state(&self) -> Result<std::sync::RwLockWriteGuard<'_, CacheState>> {
        self.state.write().map_err(|_| lock_poisoned("write_cache_state"))
    }
}

fn lock_poisoned(operation: &str) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: "Lock poisoned".to_string(),
    }
}

/// Invalidate-on-write cache of graph snapshots, one per collection.
pub struct GraphCacheService {
    config: GraphConfig,
    slots: RwLock<HashMap<CollectionId, Arc<CollectionSlot>>>,
    layout_engine: Option<Arc<dyn LayoutEngine>>,
}

impl GraphCacheService {
    /// Creates a cache with no open collections.
    #[must_use]
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            slots: RwLock::new(HashMap::new()),
            layout_engine: None,
        }
    }

    /// Sets the engine used for preset layouts.
    #[must_use]
    pub fn with_layout_engine(mut self, engine: Arc<dyn LayoutEngine>) -> Self {
        self.layout_engine = Some(engine);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Returns the layout engine, if configured.
    #[must_use]
    pub fn layout_engine(&self) -> Option<&Arc<dyn LayoutEngine>> {
        self.layout_engine.as_ref()
    }

    // ========================================================================
    // Collection Lifecycle
    // ========================================================================

    /// Registers `collection` backed by `store`.
    ///
    /// Reopening an open collection replaces its slot and drops the old
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot registry lock is poisoned.
    pub fn open_collection(
        &self,
        collection: CollectionId,
        store: Arc<dyn GraphStore>,
    ) -> Result<()> {
        let slot = Arc::new(CollectionSlot {
            store,
            state: RwLock::new(CacheState::default()),
            build_lock: Mutex::new(()),
            layouts: Arc::new(LayoutCache::new(self.config.layout_cache_capacity)),
        });

        let mut slots = self.slots.write().map_err(|_| lock_poisoned("open_collection"))?;
        if slots.insert(collection.clone(), slot).is_some() {
            tracing::info!(collection = %collection, "Reopened collection, previous cache dropped");
        } else {
            tracing::debug!(collection = %collection, "Opened collection");
        }
        Ok(())
    }

    /// Drops the slot for `collection`. Returns false if it was not open.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot registry lock is poisoned.
    pub fn close_collection(&self, collection: &CollectionId) -> Result<bool> {
        let mut slots = self.slots.write().map_err(|_| lock_poisoned("close_collection"))?;
        let removed = slots.remove(collection).is_some();
        if removed {
            tracing::debug!(collection = %collection, "Closed collection");
        }
        Ok(removed)
    }

    /// Returns true if `collection` is open.
    #[must_use]
    pub fn is_open(&self, collection: &CollectionId) -> bool {
        self.slots
            .read()
            .is_ok_and(|slots| slots.contains_key(collection))
    }

    fn slot(&self, collection: &CollectionId) -> Result<Arc<CollectionSlot>> {
        let slots = self.slots.read().map_err(|_| lock_poisoned("lookup_collection"))?;
        slots
            .get(collection)
            .cloned()
            .ok_or_else(|| Error::CollectionNotOpen(collection.to_string()))
    }

    /// Returns the backing store of `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CollectionNotOpen`] if the collection is not open.
    pub fn store(&self, collection: &CollectionId) -> Result<Arc<dyn GraphStore>> {
        Ok(Arc::clone(&self.slot(collection)?.store))
    }

    /// Returns the layout cache of `collection`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CollectionNotOpen`] if the collection is not open.
    pub fn layouts(&self, collection: &CollectionId) -> Result<Arc<LayoutCache>> {
        Ok(Arc::clone(&self.slot(collection)?.layouts))
    }

    // ========================================================================
    // Freshness
    // ========================================================================

    /// Returns a snapshot of `collection`, rebuilding it if invalid.
    ///
    /// Never fails: problems are reported through [`CacheView::error`] and
    /// `is_valid`.
    #[instrument(
        name = "kgview.cache.ensure_fresh",
        skip(self),
        fields(collection = %collection, cache_hit = tracing::field::Empty)
    )]
    pub fn ensure_fresh(&self, collection: &CollectionId) -> CacheView {
        let slot = match self.slot(collection) {
            Ok(slot) => slot,
            Err(e) => return CacheView::failed(&e),
        };

        match slot.read_state() {
            Ok(state) if state.is_valid && state.snapshot.is_some() => {
                record_request("hit");
                tracing::Span::current().record("cache_hit", true);
                return state.view();
            },
            Ok(_) => {},
            Err(e) => return CacheView::failed(&e),
        }

        record_request("miss");
        tracing::Span::current().record("cache_hit", false);

        // Single flight: one build per slot at a time.
        let _build = slot
            .build_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let generation = match slot.read_state() {
            Ok(state) if state.is_valid && state.snapshot.is_some() => {
                tracing::debug!(
                    collection = %collection,
                    "Reusing snapshot built by concurrent caller"
                );
                return state.view();
            },
            Ok(state) => state.generation,
            Err(e) => return CacheView::failed(&e),
        };

        let start = Instant::now();
        let result = self.build_snapshot(collection, slot.store.as_ref());
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("graph_cache_build_duration_ms").record(duration_ms);

        let mut state = match slot.write_state() {
            Ok(state) => state,
            Err(e) => return CacheView::failed(&e),
        };

        match result {
            Ok(snapshot) => {
                let current = state.generation == generation;
                tracing::info!(
                    collection = %collection,
                    entities = snapshot.entity_metrics.len(),
                    relationships = snapshot.relationships.len(),
                    communities = snapshot.communities.len(),
                    duration_ms,
                    "Graph cache rebuilt"
                );
                if !current {
                    tracing::debug!(
                        collection = %collection,
                        "Cache invalidated during rebuild, snapshot stored as stale"
                    );
                }
                state.snapshot = Some(Arc::new(snapshot));
                state.is_valid = current;
                state.last_error = None;
                metrics::counter!("graph_cache_builds_total", "status" => "success").increment(1);
            },
            Err(e) => {
                tracing::warn!(
                    collection = %collection,
                    error = %e,
                    has_stale_snapshot = state.snapshot.is_some(),
                    "Graph cache rebuild failed"
                );
                state.is_valid = false;
                state.last_error = Some(e.to_string());
                metrics::counter!("graph_cache_builds_total", "status" => "error").increment(1);
            },
        }

        state.view()
    }

    fn build_snapshot(
        &self,
        collection: &CollectionId,
        store: &dyn GraphStore,
    ) -> Result<GraphSnapshot> {
        let entities = store.get_top_entities(self.config.entity_fetch_limit)?;
        let relationships = store.get_all_relationships()?;
        let communities = store.get_all_communities()?;

        let mut snapshot = GraphSnapshot::from_records(entities, &relationships, &communities);

        if let Some(engine) = &self.layout_engine {
            let (nodes, edges) = layout_input(&snapshot.entity_metrics, &snapshot.relationships);
            match engine.compute(&nodes, &edges) {
                Ok(layout) => snapshot.preset_layout = Some(Arc::new(layout)),
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "Preset layout failed");
                },
            }
        }

        Ok(snapshot)
    }

    /// Forces the next [`ensure_fresh`](Self::ensure_fresh) to rebuild.
    ///
    /// Keeps the current snapshot, marked invalid, and clears cached
    /// layouts. Returns false if the collection is not open.
    pub fn invalidate(&self, collection: &CollectionId) -> bool {
        let Ok(slot) = self.slot(collection) else {
            tracing::debug!(collection = %collection, "Invalidate on unopened collection ignored");
            return false;
        };

        // Recover a poisoned lock: invalidation must not be lost.
        let mut state = slot.state.write().unwrap_or_else(PoisonError::into_inner);
        state.is_valid = false;
        state.generation += 1;
        drop(state);

        slot.layouts.clear();
        metrics::counter!("graph_cache_invalidations_total").increment(1);
        tracing::debug!(collection = %collection, "Graph cache invalidated");
        true
    }
}

fn record_request(result: &'static str) {
    metrics::counter!("graph_cache_requests_total", "result" => result).increment(1);
}
