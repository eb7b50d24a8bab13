//! Backing store contract for knowledge graph data.
//!
//! The store owns the entity, relationship, community, and topic tables.
//! kgview reads them through this trait and treats every accessor as a
//! read-only snapshot query.
//!
//! # Available Implementations
//!
//! | Store | Use Case |
//! |-------|----------|
//! | `InMemoryGraphStore` | Testing, JSON snapshots, the `kgview` CLI |
//!
//! # Error Modes
//!
//! All accessors return `Result<T>` with errors propagated via [`crate::Error`].
//! A missing table or unreachable database is an error, not an empty result:
//! the graph cache uses the distinction to decide whether a snapshot is valid.
//!
//! | Operation | Used By |
//! |-----------|---------|
//! | `get_top_entities` | Graph cache build |
//! | `get_all_relationships` | Graph cache build |
//! | `get_all_communities` | Graph cache build |
//! | `find_topic_associations` | Timeline builder |
//! | `get_website` | Timeline builder |
//! | `get_related_topics` | Topic expander |
//! | `get_topic_hierarchy` | Topic graph query |
//! | `get_relationships_for_topics` | Topic graph query |
//! | `build_graph` / `clear` | Rebuild and clear triggers |

use crate::Result;
use crate::models::graph::{RawCommunity, RawEntity, RawRelationship};
use crate::models::topic::{
    TopicAssociation, TopicHierarchyNode, TopicRelationship, WebsiteRecord,
};

/// Trait for knowledge graph backing stores.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn GraphStore>`
/// - Use interior mutability (e.g., `RwLock`) for mutable state
/// - `get_top_entities` should order by extraction count, highest first
/// - `find_topic_associations` must order by relevance, highest first
pub trait GraphStore: Send + Sync {
    // ========================================================================
    // Graph Tables
    // ========================================================================

    /// Returns up to `limit` entities, most frequently extracted first.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity table cannot be read.
    fn get_top_entities(&self, limit: usize) -> Result<Vec<RawEntity>>;

    /// Returns every stored relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the relationship table cannot be read.
    fn get_all_relationships(&self) -> Result<Vec<RawRelationship>>;

    /// Returns every stored community.
    ///
    /// # Errors
    ///
    /// Returns an error if the community table cannot be read.
    fn get_all_communities(&self) -> Result<Vec<RawCommunity>>;

    // ========================================================================
    // Topic Tables
    // ========================================================================

    /// Returns associations whose topic text contains `topic`, ignoring case,
    /// ordered by relevance descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the association table cannot be read.
    fn find_topic_associations(&self, topic: &str) -> Result<Vec<TopicAssociation>>;

    /// Returns the page record for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page table cannot be read.
    fn get_website(&self, url: &str) -> Result<Option<WebsiteRecord>>;

    /// Returns up to `limit` topics related to `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the related-topics index cannot be read.
    fn get_related_topics(&self, topic: &str, limit: usize) -> Result<Vec<String>>;

    /// Returns the full topic hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if the hierarchy table cannot be read.
    fn get_topic_hierarchy(&self) -> Result<Vec<TopicHierarchyNode>>;

    /// Returns relationships touching any of `topic_ids` with strength of at
    /// least `min_strength`.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic relationship table cannot be read.
    fn get_relationships_for_topics(
        &self,
        topic_ids: &[String],
        min_strength: f64,
    ) -> Result<Vec<TopicRelationship>>;

    // ========================================================================
    // Write Triggers
    // ========================================================================

    /// Rebuilds the graph tables from their sources.
    ///
    /// Callers must invalidate any cache over this store afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuild fails.
    fn build_graph(&self) -> Result<()>;

    /// Removes all graph data.
    ///
    /// Callers must invalidate any cache over this store afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    fn clear(&self) -> Result<()>;
}
