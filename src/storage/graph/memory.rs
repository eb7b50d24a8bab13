//! In-memory graph store.
//!
//! Provides a non-persistent implementation of [`GraphStore`] for tests, for
//! the `kgview` CLI, and for embedding callers that already hold the graph
//! tables in memory. Contents can be loaded from a JSON [`StoreSnapshot`].

use crate::models::graph::{RawCommunity, RawEntity, RawRelationship};
use crate::models::topic::{
    TopicAssociation, TopicHierarchyNode, TopicRelationship, WebsiteRecord,
};
use crate::storage::traits::graph::GraphStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serializable contents of an [`InMemoryGraphStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Entity table.
    pub entities: Vec<RawEntity>,
    /// Relationship table.
    pub relationships: Vec<RawRelationship>,
    /// Community table.
    pub communities: Vec<RawCommunity>,
    /// Topic-to-page associations.
    pub topic_associations: Vec<TopicAssociation>,
    /// Page records.
    pub websites: Vec<WebsiteRecord>,
    /// Related-topics index.
    pub related_topics: HashMap<String, Vec<String>>,
    /// Topic hierarchy.
    pub topic_hierarchy: Vec<TopicHierarchyNode>,
    /// Topic relationships.
    pub topic_relationships: Vec<TopicRelationship>,
}

/// In-memory graph store.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
///
/// # Example
///
/// ```rust
/// use kgview::storage::{GraphStore, InMemoryGraphStore};
/// use kgview::models::graph::{RawEntity, RawRelationship};
///
/// let store = InMemoryGraphStore::new();
/// store.insert_entity(RawEntity::named("Rust")).unwrap();
/// store.insert_entity(RawEntity::named("Cargo")).unwrap();
/// store.insert_relationship(RawRelationship::between("Rust", "Cargo")).unwrap();
///
/// assert_eq!(store.get_all_relationships().unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    data: RwLock<StoreSnapshot>,
    builds: AtomicUsize,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
            builds: AtomicUsize::new(0),
        }
    }

    /// Parses a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the JSON does not match [`StoreSnapshot`].
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: StoreSnapshot = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("invalid graph snapshot: {e}")))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Loads a JSON snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_snapshot", format!("{}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Returns a copy of the store contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn to_snapshot(&self) -> Result<StoreSnapshot> {
        Ok(self.read("to_snapshot")?.clone())
    }

    /// Returns how many times `build_graph` ran.
    #[must_use]
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Adds an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_entity(&self, entity: RawEntity) -> Result<()> {
        self.write("insert_entity")?.entities.push(entity);
        Ok(())
    }

    /// Adds a relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_relationship(&self, relationship: RawRelationship) -> Result<()> {
        self.write("insert_relationship")?
            .relationships
            .push(relationship);
        Ok(())
    }

    /// Adds a community.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_community(&self, community: RawCommunity) -> Result<()> {
        self.write("insert_community")?.communities.push(community);
        Ok(())
    }

    /// Adds a topic-to-page association.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_association(&self, association: TopicAssociation) -> Result<()> {
        self.write("insert_association")?
            .topic_associations
            .push(association);
        Ok(())
    }

    /// Inserts or replaces a page record (keyed by URL).
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn upsert_website(&self, website: WebsiteRecord) -> Result<()> {
        let mut data = self.write("upsert_website")?;
        if let Some(existing) = data.websites.iter_mut().find(|w| w.url == website.url) {
            *existing = website;
        } else {
            data.websites.push(website);
        }
        Ok(())
    }

    /// Replaces the related-topics entry for `topic`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_related_topics<I, S>(&self, topic: impl Into<String>, related: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write("set_related_topics")?
            .related_topics
            .insert(topic.into(), related.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Adds a topic hierarchy node.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_topic_node(&self, node: TopicHierarchyNode) -> Result<()> {
        self.write("insert_topic_node")?.topic_hierarchy.push(node);
        Ok(())
    }

    /// Adds a topic relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert_topic_relationship(&self, relationship: TopicRelationship) -> Result<()> {
        self.write("insert_topic_relationship")?
            .topic_relationships
            .push(relationship);
        Ok(())
    }

    fn read(&self, operation: &str) -> Result<std::sync::RwLockReadGuard<'_, StoreSnapshot>> {
        self.data
            .read()
            .map_err(|_| Error::operation(operation, "Lock poisoned"))
    }

    fn write(&self, operation: &str) -> Result<std::sync::RwLockWriteGuard<'_, StoreSnapshot>> {
        self.data
            .write()
            .map_err(|_| Error::operation(operation, "Lock poisoned"))
    }
}

impl GraphStore for InMemoryGraphStore {
    fn get_top_entities(&self, limit: usize) -> Result<Vec<RawEntity>> {
        let data = self.read("get_top_entities")?;
        let mut entities = data.entities.clone();
        // Stable sort keeps insertion order among equal counts
        entities.sort_by(|a, b| b.count.unwrap_or(0).cmp(&a.count.unwrap_or(0)));
        entities.truncate(limit);
        Ok(entities)
    }

    fn get_all_relationships(&self) -> Result<Vec<RawRelationship>> {
        Ok(self.read("get_all_relationships")?.relationships.clone())
    }

    fn get_all_communities(&self) -> Result<Vec<RawCommunity>> {
        Ok(self.read("get_all_communities")?.communities.clone())
    }

    fn find_topic_associations(&self, topic: &str) -> Result<Vec<TopicAssociation>> {
        let needle = topic.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let data = self.read("find_topic_associations")?;
        let mut matches: Vec<TopicAssociation> = data
            .topic_associations
            .iter()
            .filter(|a| a.topic.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        Ok(matches)
    }

    fn get_website(&self, url: &str) -> Result<Option<WebsiteRecord>> {
        let data = self.read("get_website")?;
        Ok(data.websites.iter().find(|w| w.url == url).cloned())
    }

    fn get_related_topics(&self, topic: &str, limit: usize) -> Result<Vec<String>> {
        let data = self.read("get_related_topics")?;
        Ok(data
            .related_topics
            .get(topic)
            .map(|related| related.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn get_topic_hierarchy(&self) -> Result<Vec<TopicHierarchyNode>> {
        Ok(self.read("get_topic_hierarchy")?.topic_hierarchy.clone())
    }

    fn get_relationships_for_topics(
        &self,
        topic_ids: &[String],
        min_strength: f64,
    ) -> Result<Vec<TopicRelationship>> {
        let data = self.read("get_relationships_for_topics")?;
        Ok(data
            .topic_relationships
            .iter()
            .filter(|r| r.strength >= min_strength)
            .filter(|r| topic_ids.contains(&r.from_topic) || topic_ids.contains(&r.to_topic))
            .cloned()
            .collect())
    }

    fn build_graph(&self) -> Result<()> {
        // Graph tables are maintained by the inserts; a build only bumps the counter
        self.builds.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(builds = self.build_count(), "In-memory graph build");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut data = self.write("clear")?;
        data.entities.clear();
        data.relationships.clear();
        data.communities.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        store
            .insert_entity(RawEntity::named("Rust").with_count(10))
            .unwrap();
        store
            .insert_entity(RawEntity::named("Cargo").with_count(3))
            .unwrap();
        store
            .insert_entity(RawEntity::named("Tokio").with_count(7))
            .unwrap();
        store
            .insert_relationship(RawRelationship::between("Rust", "Cargo"))
            .unwrap();
        store
    }

    #[test]
    fn test_top_entities_ordered_by_count() {
        let store = sample_store();
        let top = store.get_top_entities(2).unwrap();
        let names: Vec<_> = top.iter().filter_map(RawEntity::normalized_name).collect();
        assert_eq!(names, vec!["Rust", "Tokio"]);
    }

    #[test]
    fn test_topic_associations_substring_and_order() {
        let store = InMemoryGraphStore::new();
        store
            .insert_association(TopicAssociation::new("Rust async", "https://a", 0.4))
            .unwrap();
        store
            .insert_association(TopicAssociation::new("rust", "https://b", 0.9))
            .unwrap();
        store
            .insert_association(TopicAssociation::new("python", "https://c", 1.0))
            .unwrap();

        let found = store.find_topic_associations("RUST").unwrap();
        let urls: Vec<_> = found.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b", "https://a"]);
        assert!(store.find_topic_associations("  ").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_website_replaces() {
        let store = InMemoryGraphStore::new();
        store.upsert_website(WebsiteRecord::new("https://a")).unwrap();
        store
            .upsert_website(WebsiteRecord::new("https://a").with_title("A"))
            .unwrap();
        let site = store.get_website("https://a").unwrap().unwrap();
        assert_eq!(site.title.as_deref(), Some("A"));
        assert_eq!(store.to_snapshot().unwrap().websites.len(), 1);
    }

    #[test]
    fn test_related_topics_limit() {
        let store = InMemoryGraphStore::new();
        store
            .set_related_topics("rust", ["cargo", "tokio", "serde"])
            .unwrap();
        assert_eq!(store.get_related_topics("rust", 2).unwrap(), vec!["cargo", "tokio"]);
        assert!(store.get_related_topics("go", 10).unwrap().is_empty());
    }

    #[test]
    fn test_relationships_for_topics_filters_strength() {
        let store = InMemoryGraphStore::new();
        for (from, to, strength) in [("t1", "t2", 0.9), ("t2", "t3", 0.2), ("t4", "t5", 0.9)] {
            store
                .insert_topic_relationship(TopicRelationship {
                    from_topic: from.to_string(),
                    to_topic: to.to_string(),
                    relationship_type: "related".to_string(),
                    strength,
                })
                .unwrap();
        }
        let found = store
            .get_relationships_for_topics(&["t2".to_string()], 0.5)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].from_topic, "t1");
    }

    #[test]
    fn test_clear_and_build() {
        let store = sample_store();
        store.build_graph().unwrap();
        assert_eq!(store.build_count(), 1);

        store.clear().unwrap();
        assert!(store.get_top_entities(10).unwrap().is_empty());
        assert!(store.get_all_relationships().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_json_roundtrip_shape() {
        let json = r#"{
            "entities": [{"entityName": "Rust", "count": 2}, {"name": "Cargo"}],
            "relationships": [{"rowId": 1, "fromEntity": "Rust", "toEntity": "Cargo",
                               "sources": "[\"https://a\"]"}],
            "communities": [{"id": "c1", "entities": "[\"Rust\",\"Cargo\"]"}]
        }"#;
        let store = InMemoryGraphStore::from_json(json).unwrap();
        assert_eq!(store.get_top_entities(10).unwrap().len(), 2);
        assert_eq!(store.get_all_communities().unwrap().len(), 1);
        assert!(store.get_topic_hierarchy().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_snapshot_is_invalid_input() {
        let err = InMemoryGraphStore::from_json("{\"entities\": 5}").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
