// Allow non-const functions that use f64::clamp (not const-stable yet)
#![allow(clippy::missing_const_for_fn)]

//! Knowledge graph record types.
//!
//! Two shapes exist for every record:
//!
//! | Raw (store boundary) | Derived (algorithms) |
//! |----------------------|----------------------|
//! | [`RawEntity`] | [`Entity`] |
//! | [`RawRelationship`] | [`Relationship`] |
//! | [`RawCommunity`] | [`Community`] |
//!
//! Raw records mirror what the backing store hands out: optional fields,
//! alternative field names (`entityName` or `name`), and list fields that may
//! arrive either as JSON arrays or as JSON-encoded strings. Conversion into
//! the derived form happens once, when the graph cache is built, so the
//! algorithms only ever see a closed, validated shape.
//!
//! Data-quality problems never fail a conversion. Malformed list fields are
//! logged and read as empty lists.
//!
//! # Example
//!
//! ```rust
//! use kgview::models::graph::{RawRelationship, Relationship};
//!
//! let raw = RawRelationship::between("Rust", "Cargo")
//!     .with_sources_json(r#"["https://a", "https://a", "https://b"]"#);
//! let rel = Relationship::from_raw(&raw, 0);
//! assert_eq!(rel.sources, vec!["https://a", "https://b"]);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Confidence assumed when a raw record carries none.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Community assigned to entities not covered by any community record.
pub const DEFAULT_COMMUNITY: &str = "default";

/// Identity of one backing collection (one graph).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(String);

impl CollectionId {
    /// Creates a collection ID from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the collection ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CollectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CollectionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Raw records (store boundary)
// ============================================================================

/// An entity as returned by the backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    /// Explicit identifier, if the store has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Entity name under its extraction-table column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    /// Entity name under its short column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Entity type under its extraction-table column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// Entity type under its short column name.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Extraction confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Number of times the entity was extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl RawEntity {
    /// Creates a raw entity with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            entity_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the entity type.
    #[must_use]
    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets the extraction count.
    #[must_use]
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Returns the trimmed entity name, preferring `entityName` over `name`.
    ///
    /// Returns `None` when neither field holds a non-blank value.
    #[must_use]
    pub fn normalized_name(&self) -> Option<&str> {
        [self.entity_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|n| !n.is_empty())
    }

    /// Returns the entity type, preferring `entityType` over `type`.
    #[must_use]
    pub fn normalized_type(&self) -> &str {
        self.entity_type
            .as_deref()
            .or(self.kind.as_deref())
            .map_or("unknown", str::trim)
    }
}

/// A relationship as returned by the backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRelationship {
    /// Store row identifier.
    #[serde(default, alias = "rowid", skip_serializing_if = "Option::is_none")]
    pub row_id: Option<i64>,
    /// Source entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Relationship label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    /// Extraction confidence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Source URLs, as a JSON array or a JSON-encoded string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Value>,
    /// Number of times the relationship was extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl RawRelationship {
    /// Creates a raw relationship between two entity names.
    #[must_use]
    pub fn between(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from_entity: from.into(),
            to_entity: to.into(),
            ..Self::default()
        }
    }

    /// Sets the row ID.
    #[must_use]
    pub const fn with_row_id(mut self, row_id: i64) -> Self {
        self.row_id = Some(row_id);
        self
    }

    /// Sets the relationship type.
    #[must_use]
    pub fn with_type(mut self, relationship_type: impl Into<String>) -> Self {
        self.relationship_type = Some(relationship_type.into());
        self
    }

    /// Sets the confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Sets sources as a JSON-encoded string, the way the store columns hold them.
    #[must_use]
    pub fn with_sources_json(mut self, json: impl Into<String>) -> Self {
        self.sources = Some(Value::String(json.into()));
        self
    }

    /// Sets sources as a list.
    #[must_use]
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(Value::Array(
            sources.into_iter().map(|s| Value::String(s.into())).collect(),
        ));
        self
    }
}

/// A community as returned by the backing store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommunity {
    /// Community identifier (string or number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Member entity names, as a JSON array or a JSON-encoded string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Value>,
}

impl RawCommunity {
    /// Creates a raw community with an explicit ID and member list.
    #[must_use]
    pub fn new<I, S>(id: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Some(Value::String(id.into())),
            entities: Some(Value::Array(
                members.into_iter().map(|m| Value::String(m.into())).collect(),
            )),
        }
    }

    /// Creates a raw community whose members are a JSON-encoded string.
    #[must_use]
    pub fn with_members_json(id: Option<&str>, json: impl Into<String>) -> Self {
        Self {
            id: id.map(|i| Value::String(i.to_string())),
            entities: Some(Value::String(json.into())),
        }
    }
}

/// Parses a list field that may be a JSON array or a JSON-encoded array string.
///
/// Returns `None` when the value is malformed. Non-string array elements are
/// skipped; an empty string reads as an empty list.
pub(crate) fn parse_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(s) if s.trim().is_empty() => Some(Vec::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Array(_)) => parse_string_list(&inner),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// Derived records
// ============================================================================

/// An entity in display form, carrying derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Identifier (explicit store ID, or the name).
    pub id: String,
    /// Canonical name. Case-sensitive identity key.
    pub name: String,
    /// Entity type.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Extraction confidence (0.0 to 1.0).
    pub confidence: f64,
    /// Extraction count.
    pub count: u64,
    /// Number of relationship endpoints touching this entity.
    pub degree: usize,
    /// Degree normalised by the maximum degree (0.0 to 1.0).
    pub importance: f64,
    /// Community assignment.
    pub community_id: String,
    /// Display size.
    pub size: f64,
}

impl Entity {
    /// Creates an entity with zeroed metrics.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            entity_type: entity_type.into(),
            confidence: DEFAULT_CONFIDENCE,
            count: 1,
            degree: 0,
            importance: 0.0,
            community_id: DEFAULT_COMMUNITY.to_string(),
            size: 0.0,
        }
    }

    /// Sets the importance score.
    #[must_use]
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Returns true if `key` equals the name or the ID, ignoring case.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        let key = key.trim().to_lowercase();
        self.name.to_lowercase() == key || self.id.to_lowercase() == key
    }
}

/// A relationship in display form.
///
/// Traversal treats relationships as undirected even though `from_entity`
/// and `to_entity` are directional labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Store row identifier. Unique within one snapshot.
    pub row_id: i64,
    /// Source entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Relationship label.
    pub relationship_type: String,
    /// Extraction confidence (0.0 to 1.0).
    pub confidence: f64,
    /// Deduplicated source URLs.
    pub sources: Vec<String>,
    /// Extraction count.
    pub count: u64,
}

impl Relationship {
    /// Converts a fetched relationship list.
    ///
    /// Records without a row ID get `max_explicit + 1 + position`, so a
    /// synthesised ID never collides with one the store supplied.
    #[must_use]
    pub fn from_raw_list(raws: &[RawRelationship]) -> Vec<Self> {
        let base = raws
            .iter()
            .filter_map(|r| r.row_id)
            .max()
            .map_or(0, |max| max.saturating_add(1));
        raws.iter()
            .enumerate()
            .map(|(position, raw)| {
                let offset = i64::try_from(position).unwrap_or(i64::MAX);
                Self::from_raw(raw, base.saturating_add(offset))
            })
            .collect()
    }

    /// Converts a raw relationship.
    ///
    /// `fallback_row_id` is used when the store provides no row ID.
    #[must_use]
    pub fn from_raw(raw: &RawRelationship, fallback_row_id: i64) -> Self {
        let sources = raw.sources.as_ref().map_or_else(Vec::new, |value| {
            parse_string_list(value).unwrap_or_else(|| {
                tracing::warn!(
                    from = %raw.from_entity,
                    to = %raw.to_entity,
                    "Malformed relationship sources, treating as empty"
                );
                Vec::new()
            })
        });

        Self {
            row_id: raw.row_id.unwrap_or(fallback_row_id),
            from_entity: raw.from_entity.trim().to_string(),
            to_entity: raw.to_entity.trim().to_string(),
            relationship_type: raw
                .relationship_type
                .clone()
                .unwrap_or_else(|| "related_to".to_string()),
            confidence: raw.confidence.unwrap_or(DEFAULT_CONFIDENCE).clamp(0.0, 1.0),
            sources: dedup_preserving_order(sources),
            count: raw.count.unwrap_or(1),
        }
    }

    /// Creates a relationship between two entity names.
    #[must_use]
    pub fn new(row_id: i64, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            row_id,
            from_entity: from.into(),
            to_entity: to.into(),
            relationship_type: "related_to".to_string(),
            confidence: DEFAULT_CONFIDENCE,
            sources: Vec::new(),
            count: 1,
        }
    }

    /// Returns true if both endpoints name the same entity.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from_entity == self.to_entity
    }

    /// Returns the endpoint opposite `name`, if `name` is an endpoint.
    #[must_use]
    pub fn other_end(&self, name: &str) -> Option<&str> {
        if self.from_entity == name {
            Some(&self.to_entity)
        } else if self.to_entity == name {
            Some(&self.from_entity)
        } else {
            None
        }
    }

    /// Returns a copy with `sources` truncated to the display budget.
    #[must_use]
    pub fn for_display(&self, source_limit: usize) -> Self {
        let mut shown = self.clone();
        shown.sources.truncate(source_limit);
        shown
    }
}

/// A community in derived form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    /// Community identifier.
    pub id: String,
    /// Member entity names.
    pub entities: Vec<String>,
}

impl Community {
    /// Converts a raw community.
    ///
    /// Communities without an ID get `community_<position>`. Malformed member
    /// lists are logged and read as empty.
    #[must_use]
    pub fn from_raw(raw: &RawCommunity, position: usize) -> Self {
        let id = match &raw.id {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("community_{position}"),
        };

        let entities = raw.entities.as_ref().map_or_else(Vec::new, |value| {
            parse_string_list(value).unwrap_or_else(|| {
                tracing::warn!(community = %id, "Malformed community members, treating as empty");
                Vec::new()
            })
        });

        Self { id, entities }
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
