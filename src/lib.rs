//! # kgview
//!
//! In-memory knowledge graph cache and query layer.
//!
//! kgview holds a snapshot of the entities, relationships, and communities
//! extracted from browsing history, derives per-entity metrics from it, and
//! answers the questions a graph dashboard asks:
//!
//! - What is near entity X? (bounded BFS neighborhood)
//! - Which entities matter most? (importance layer with connectivity repair)
//! - How is the graph fragmented? (connected components)
//! - When did I interact with a topic? (multi-source topic timelines)
//!
//! ## Architecture
//!
//! ```text
//! request handler
//!     │
//!     ▼
//! GraphQueryService ──▶ GraphCacheService.ensure_fresh(collection)
//!     │                        │ miss: GraphStore fetch + entity metrics
//!     │                        ▼
//!     │                  Arc<GraphSnapshot>
//!     ▼
//! neighborhood / importance / connectivity / timeline
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use kgview::{CollectionId, GraphConfig, GraphQueryService};
//! use kgview::storage::graph::InMemoryGraphStore;
//!
//! let store = InMemoryGraphStore::load_snapshot("graph.json")?;
//! let service = GraphQueryService::new(GraphConfig::default());
//! let collection = CollectionId::new("history");
//! service.open_collection(collection.clone(), std::sync::Arc::new(store));
//!
//! let layer = service.global_importance_layer(&collection, &Default::default());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::GraphConfig;
pub use models::graph::{CollectionId, Community, Entity, Relationship};
pub use models::topic::{ActivityType, TopicActivity, TopicTimeline};
pub use services::{GraphCacheService, GraphQueryService, GraphSnapshot};
pub use storage::GraphStore;

/// Error type for kgview operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed snapshot files, unparsable config values |
/// | `OperationFailed` | Store queries fail, locks are poisoned, I/O errors |
/// | `CollectionNotOpen` | A query names a collection that was never opened |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - A backing store accessor fails
    /// - A cache or index lock is poisoned
    /// - Reading a config or snapshot file fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The named collection has no open cache slot.
    #[error("collection not open: {0}")]
    CollectionNotOpen(String),
}

impl Error {
    /// Shorthand for [`Error::OperationFailed`].
    pub fn operation(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for kgview operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use kgview::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
