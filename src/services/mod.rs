//! Graph services.
//!
//! Pure graph algorithms plus the cache and query services that run them
//! against a collection's backing store.
//!
//! | Module | Provides |
//! |--------|----------|
//! | `entity_metrics` | Degree, importance, community, and size per entity |
//! | `connectivity` | Connected components and their statistics |
//! | `neighborhood` | Bounded BFS around one entity |
//! | `importance` | Importance layer selection with bridge repair |
//! | `layout` | Layout engine seam and per-collection layout cache |
//! | `topic_expansion` | One-hop related topic expansion |
//! | `timeline` | Per-topic activity timelines |
//! | `search` | Enrichment collaborator for neighborhood responses |
//! | `graph_cache` | Per-collection snapshot cache with invalidation |
//! | `query` | Operation facade returning success/error responses |

pub mod connectivity;
pub mod entity_metrics;
pub mod graph_cache;
pub mod importance;
pub mod layout;
pub mod neighborhood;
pub mod query;
pub mod search;
pub mod timeline;
pub mod topic_expansion;

pub use connectivity::{ComponentStats, analyze_connectivity, connected_components};
pub use entity_metrics::calculate_entity_metrics;
pub use graph_cache::{CacheView, GraphCacheService, GraphSnapshot};
pub use importance::{
    ImportanceLayer, ImportanceMetadata, ImportanceOptions, select_important_entities,
};
pub use layout::{CircularLayout, LayoutCache, LayoutEngine, LayoutOutput};
pub use neighborhood::{Neighborhood, find_neighborhood};
pub use query::{
    GraphQueryService, GraphStatsResponse, ImportanceQuery, ImportanceResponse, LayoutResponse,
    NeighborhoodQuery, NeighborhoodResponse, OperationResponse, TimelineResponse,
    TopicGraphResponse,
};
pub use search::{EntitySearch, SearchEnrichment, StoreEntitySearch};
pub use timeline::{TimelineSet, build_timelines};
pub use topic_expansion::expand_topics;
