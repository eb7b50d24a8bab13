//! Search and enrichment collaborator.
//!
//! Neighborhood responses can carry extra context about their entities:
//! related entities, top topics, and pages. The [`EntitySearch`] trait
//! supplies it. When a neighborhood lookup finds no center entity, the same
//! search runs on the requested name as a fallback.

use crate::Result;
use crate::storage::GraphStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Maximum items of each kind in an enrichment.
pub const ENRICHMENT_LIMIT: usize = 10;

/// A page found by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteHit {
    /// Page URL.
    pub url: String,
    /// Page title, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Topic relevance of the page.
    pub relevance: f64,
}

/// Context returned by a search collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEnrichment {
    /// Entity names related to the query.
    pub related_entities: Vec<String>,
    /// Topics related to the query.
    pub top_topics: Vec<String>,
    /// Pages associated with the query.
    pub websites: Vec<WebsiteHit>,
}

impl SearchEnrichment {
    /// Returns true if the search found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.related_entities.is_empty() && self.top_topics.is_empty() && self.websites.is_empty()
    }
}

/// Trait for search collaborators.
pub trait EntitySearch: Send + Sync {
    /// Searches for context around `entity_names`.
    ///
    /// # Errors
    ///
    /// Returns an error if the search backend fails.
    fn enrich(&self, entity_names: &[String]) -> Result<SearchEnrichment>;
}

/// Search over the backing store's relationship and topic tables.
///
/// Related entities are the other endpoints of relationships whose endpoint
/// contains a query name (ignoring case).
pub struct StoreEntitySearch {
    store: Arc<dyn GraphStore>,
}

impl StoreEntitySearch {
    /// Creates a search over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

impl EntitySearch for StoreEntitySearch {
    fn enrich(&self, entity_names: &[String]) -> Result<SearchEnrichment> {
        let needles: Vec<String> = entity_names
            .iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        if needles.is_empty() {
            return Ok(SearchEnrichment::default());
        }
        let matches = |name: &str| {
            let name = name.to_lowercase();
            needles.iter().any(|needle| name.contains(needle.as_str()))
        };

        let mut seen = HashSet::new();
        let mut related_entities = Vec::new();
        for rel in self.store.get_all_relationships()? {
            let other = match (matches(&rel.from_entity), matches(&rel.to_entity)) {
                (true, false) => rel.to_entity,
                (false, true) => rel.from_entity,
                _ => continue,
            };
            if seen.insert(other.clone()) {
                related_entities.push(other);
            }
            if related_entities.len() >= ENRICHMENT_LIMIT {
                break;
            }
        }

        let mut top_topics = Vec::new();
        let mut websites = Vec::new();
        let mut seen_urls = HashSet::new();
        for name in entity_names {
            for topic in self.store.get_related_topics(name, ENRICHMENT_LIMIT)? {
                if !top_topics.contains(&topic) && top_topics.len() < ENRICHMENT_LIMIT {
                    top_topics.push(topic);
                }
            }
            for assoc in self.store.find_topic_associations(name)? {
                if websites.len() >= ENRICHMENT_LIMIT {
                    break;
                }
                if !seen_urls.insert(assoc.url.clone()) {
                    continue;
                }
                let title = self.store.get_website(&assoc.url)?.and_then(|w| w.title);
                websites.push(WebsiteHit {
                    url: assoc.url,
                    title,
                    relevance: assoc.relevance,
                });
            }
        }

        Ok(SearchEnrichment {
            related_entities,
            top_topics,
            websites,
        })
    }
}
