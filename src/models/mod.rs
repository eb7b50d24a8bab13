//! Data models for kgview.
//!
//! Graph records live in [`graph`], topic activity records in [`topic`].

pub mod graph;
pub mod topic;

pub use graph::{
    CollectionId, Community, DEFAULT_COMMUNITY, DEFAULT_CONFIDENCE, Entity, RawCommunity,
    RawEntity, RawRelationship, Relationship,
};
pub use topic::{
    ActivityDistribution, ActivityType, TimeRange, TimelineMetadata, TimelineQuery,
    TopicActivity, TopicAssociation, TopicHierarchyNode, TopicRelationship, TopicTimeline,
    WebsiteRecord,
};
