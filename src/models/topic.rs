//! Topic activity and timeline types.
//!
//! A topic timeline lists every interaction with pages associated with one
//! topic. Interactions come from three sources, each a different
//! [`ActivityType`]:
//!
//! | Type | Source field | Priority |
//! |------|--------------|----------|
//! | `Bookmark` | `WebsiteRecord::bookmark_date` | 3 |
//! | `Visit` | `WebsiteRecord::visit_date` | 2 |
//! | `Extraction` | `TopicAssociation::extracted_at` | 1 |
//!
//! Priority decides which activity survives when two share the same
//! `(url, timestamp)` key.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored association between a topic and a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAssociation {
    /// Topic text.
    pub topic: String,
    /// Page URL.
    pub url: String,
    /// Association relevance (0.0 to 1.0).
    #[serde(default)]
    pub relevance: f64,
    /// When the topic was extracted from the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
    /// Extracted text chunk the topic came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_chunk: Option<String>,
}

impl TopicAssociation {
    /// Creates an association.
    #[must_use]
    pub fn new(topic: impl Into<String>, url: impl Into<String>, relevance: f64) -> Self {
        Self {
            topic: topic.into(),
            url: url.into(),
            relevance,
            extracted_at: None,
            knowledge_chunk: None,
        }
    }

    /// Sets the extraction time.
    #[must_use]
    pub const fn extracted_at(mut self, at: DateTime<Utc>) -> Self {
        self.extracted_at = Some(at);
        self
    }

    /// Sets the knowledge chunk.
    #[must_use]
    pub fn with_chunk(mut self, chunk: impl Into<String>) -> Self {
        self.knowledge_chunk = Some(chunk.into());
        self
    }
}

/// A page record joined to topic associations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteRecord {
    /// Page URL.
    pub url: String,
    /// Page title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Page domain. Derived from the URL when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// When the page was bookmarked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark_date: Option<DateTime<Utc>>,
    /// Most recent visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<DateTime<Utc>>,
    /// Number of visits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_count: Option<u64>,
    /// Content summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Page description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WebsiteRecord {
    /// Creates a page record with only a URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the bookmark date.
    #[must_use]
    pub const fn bookmarked_at(mut self, at: DateTime<Utc>) -> Self {
        self.bookmark_date = Some(at);
        self
    }

    /// Sets the visit date and count.
    #[must_use]
    pub const fn visited_at(mut self, at: DateTime<Utc>, count: u64) -> Self {
        self.visit_date = Some(at);
        self.visit_count = Some(count);
        self
    }

    /// Sets the content summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Kind of interaction recorded on a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    /// The page was bookmarked.
    Bookmark,
    /// The page was visited.
    Visit,
    /// Knowledge about the topic was extracted from the page.
    Extraction,
}

impl ActivityType {
    /// Returns all activity types, highest priority first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Bookmark, Self::Visit, Self::Extraction]
    }

    /// Returns the deduplication priority (higher wins).
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Bookmark => 3,
            Self::Visit => 2,
            Self::Extraction => 1,
        }
    }

    /// Returns the activity type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bookmark => "bookmark",
            Self::Visit => "visit",
            Self::Extraction => "extraction",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One interaction on a topic timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicActivity {
    /// When the interaction happened.
    pub timestamp: DateTime<Utc>,
    /// Kind of interaction.
    pub activity_type: ActivityType,
    /// Page URL.
    pub url: String,
    /// Page title (falls back to the URL).
    pub title: String,
    /// Page domain.
    pub domain: String,
    /// Topic relevance of the page.
    pub relevance: f64,
    /// Sentence mentioning the topic (extractions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Extracted text chunk (extractions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_chunk: Option<String>,
    /// Extra per-type details, such as the visit count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Activity counts per type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDistribution {
    /// Bookmark count.
    pub bookmark: usize,
    /// Visit count.
    pub visit: usize,
    /// Extraction count.
    pub extraction: usize,
}

impl ActivityDistribution {
    /// Counts the activities in `activities`.
    #[must_use]
    pub fn from_activities(activities: &[TopicActivity]) -> Self {
        let mut distribution = Self::default();
        for activity in activities {
            distribution.record(activity.activity_type);
        }
        distribution
    }

    /// Records one activity of the given type.
    pub fn record(&mut self, activity_type: ActivityType) {
        match activity_type {
            ActivityType::Bookmark => self.bookmark += 1,
            ActivityType::Visit => self.visit += 1,
            ActivityType::Extraction => self.extraction += 1,
        }
    }

    /// Returns the total across all types.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.bookmark + self.visit + self.extraction
    }
}

/// All activity for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicTimeline {
    /// Topic name as requested.
    pub topic_name: String,
    /// Deduplicated activities, most recent first, truncated for display.
    pub activities: Vec<TopicActivity>,
    /// Deduplicated activity count before truncation.
    pub total_activity: usize,
    /// Counts per type before truncation.
    pub activity_distribution: ActivityDistribution,
    /// Whether the caller asked for this topic (as opposed to expansion).
    pub requested: bool,
}

impl TopicTimeline {
    /// Creates an empty timeline.
    #[must_use]
    pub fn empty(topic_name: impl Into<String>, requested: bool) -> Self {
        Self {
            topic_name: topic_name.into(),
            activities: Vec::new(),
            total_activity: 0,
            activity_distribution: ActivityDistribution::default(),
            requested,
        }
    }
}

/// Inclusive time window filter. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest included timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    /// Latest included timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Unbounded range.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Range covering the `days` days up to `now`.
    ///
    /// A window reaching past the representable calendar has no start.
    #[must_use]
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        let start = Duration::try_days(days).and_then(|span| now.checked_sub_signed(span));
        Self {
            start,
            end: Some(now),
        }
    }

    /// Returns true if `timestamp` falls within the range.
    #[must_use]
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| timestamp >= start)
            && self.end.is_none_or(|end| timestamp <= end)
    }
}

/// Parameters for building topic timelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    /// Seed topics. Each always gets a timeline.
    pub topics: Vec<String>,
    /// Related-topic expansion depth (0 disables expansion).
    pub related_depth: u32,
    /// Time window filter.
    pub time_range: TimeRange,
    /// Per-timeline display truncation. Falls back to the configured limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl TimelineQuery {
    /// Creates a query for the given topics with default settings.
    #[must_use]
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            related_depth: 0,
            time_range: TimeRange::all(),
            max_entries: None,
        }
    }

    /// Sets the related-topic expansion depth.
    #[must_use]
    pub const fn with_related_depth(mut self, depth: u32) -> Self {
        self.related_depth = depth;
        self
    }

    /// Sets the time range.
    #[must_use]
    pub const fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }

    /// Sets the per-timeline entry limit.
    #[must_use]
    pub const fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }
}

/// Summary across a set of timelines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineMetadata {
    /// Earliest activity across all included timelines.
    pub earliest: Option<DateTime<Utc>>,
    /// Latest activity across all included timelines.
    pub latest: Option<DateTime<Utc>>,
    /// Timelines with at least one activity.
    pub topics_with_activity: usize,
    /// Timelines included.
    pub total_topics: usize,
    /// Sum of `total_activity` across timelines.
    pub total_activities: usize,
}

/// A node of the stored topic hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicHierarchyNode {
    /// Topic identifier.
    pub topic_id: String,
    /// Topic display name.
    pub topic_name: String,
    /// Parent topic, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_topic_id: Option<String>,
    /// Depth in the hierarchy (0 = root).
    #[serde(default)]
    pub level: u32,
    /// Extraction confidence.
    #[serde(default)]
    pub confidence: f64,
}

/// A classified relationship between two topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRelationship {
    /// Source topic ID.
    pub from_topic: String,
    /// Target topic ID.
    pub to_topic: String,
    /// Relationship label.
    pub relationship_type: String,
    /// Relationship strength (0.0 to 1.0).
    pub strength: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_activity_priority_order() {
        assert!(ActivityType::Bookmark.priority() > ActivityType::Visit.priority());
        assert!(ActivityType::Visit.priority() > ActivityType::Extraction.priority());
        assert_eq!(ActivityType::all()[0], ActivityType::Bookmark);
    }

    #[test]
    fn test_activity_type_serialization() {
        let json = serde_json::to_string(&ActivityType::Extraction).unwrap();
        assert_eq!(json, "\"extraction\"");
        assert_eq!(ActivityType::Visit.to_string(), "visit");
    }

    #[test]
    fn test_time_range_contains() {
        let range = TimeRange {
            start: Some(ts(5)),
            end: Some(ts(10)),
        };
        assert!(range.contains(ts(5)));
        assert!(range.contains(ts(10)));
        assert!(!range.contains(ts(4)));
        assert!(!range.contains(ts(11)));
        assert!(TimeRange::all().contains(ts(1)));
    }

    #[test]
    fn test_time_range_last_days() {
        let range = TimeRange::last_days(7, ts(20));
        assert!(range.contains(ts(14)));
        assert!(!range.contains(ts(12)));
    }

    #[test]
    fn test_time_range_last_days_out_of_range() {
        let range = TimeRange::last_days(i64::MAX, ts(20));
        assert_eq!(range.start, None);
        assert!(range.contains(ts(1)));
        assert!(!range.contains(ts(21)));

        let range = TimeRange::last_days(3_000_000_000, ts(20));
        assert_eq!(range.start, None);
    }

    #[test]
    fn test_distribution_total() {
        let mut distribution = ActivityDistribution::default();
        distribution.record(ActivityType::Bookmark);
        distribution.record(ActivityType::Visit);
        distribution.record(ActivityType::Visit);
        assert_eq!(distribution.visit, 2);
        assert_eq!(distribution.total(), 3);
    }

    #[test]
    fn test_timeline_query_builder() {
        let query = TimelineQuery::new(["rust", "wasm"])
            .with_related_depth(1)
            .with_max_entries(10);
        assert_eq!(query.topics, vec!["rust", "wasm"]);
        assert_eq!(query.related_depth, 1);
        assert_eq!(query.max_entries, Some(10));
        assert_eq!(TimelineQuery::new(["rust"]).max_entries, None);
        assert_eq!(query.time_range, TimeRange::all());
    }
}
