//! Topic timeline building.
//!
//! A timeline merges three activity sources for the pages associated with a
//! topic:
//!
//! | Activity | Emitted when |
//! |----------|--------------|
//! | bookmark | the page record has a bookmark date |
//! | visit | the page record has a visit date |
//! | extraction | the association has an extraction date |
//!
//! Activities sharing a `(url, timestamp)` key are collapsed to the one with
//! the highest type priority. Timelines are sorted most recent first and
//! truncated for display; totals and the per-type distribution are counted
//! before truncation.
//!
//! When several topics are requested, every requested topic gets a timeline.
//! With expansion enabled, up to `max_neighbor_timelines` related topics that
//! have activity are appended, most active first.

use crate::Result;
use crate::config::GraphConfig;
use crate::models::topic::{
    ActivityDistribution, ActivityType, TimeRange, TimelineMetadata, TimelineQuery,
    TopicActivity, TopicAssociation, TopicTimeline, WebsiteRecord,
};
use crate::services::topic_expansion::expand_topics;
use crate::storage::GraphStore;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentence: a run of text up to and including terminal punctuation.
static SENTENCE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[^.!?\n]+[.!?]*").ok());

/// Marker appended to truncated snippets.
const ELLIPSIS: &str = "...";

/// Timelines for a query plus summary metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSet {
    /// Timelines, most active first.
    pub timelines: Vec<TopicTimeline>,
    /// Summary across `timelines`.
    pub metadata: TimelineMetadata,
}

/// Returns the first sentence of `text` mentioning `topic`, ignoring case.
///
/// Sentences longer than `max_chars` characters are cut and end in `...`.
#[must_use]
pub fn extract_snippet(text: &str, topic: &str, max_chars: usize) -> Option<String> {
    let needle = topic.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let sentence = match SENTENCE.as_ref() {
        Some(re) => re
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .find(|s| s.to_lowercase().contains(&needle))?,
        None => text.trim(),
    };

    if sentence.chars().count() <= max_chars {
        return Some(sentence.to_string());
    }
    let cut: String = sentence.chars().take(max_chars).collect();
    Some(format!("{}{ELLIPSIS}", cut.trim_end()))
}

/// Collapses activities sharing a `(url, timestamp)` key.
///
/// The highest-priority type survives; among equal priorities the earliest
/// in input order wins. Survivors keep their input order.
#[must_use]
pub fn dedupe_activities(activities: Vec<TopicActivity>) -> Vec<TopicActivity> {
    let mut slot_of: HashMap<(String, DateTime<Utc>), usize> = HashMap::new();
    let mut kept: Vec<TopicActivity> = Vec::with_capacity(activities.len());

    for activity in activities {
        let key = (activity.url.clone(), activity.timestamp);
        match slot_of.get(&key) {
            Some(&i) => {
                if activity.activity_type.priority() > kept[i].activity_type.priority() {
                    kept[i] = activity;
                }
            },
            None => {
                slot_of.insert(key, kept.len());
                kept.push(activity);
            },
        }
    }

    kept
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .host_str()
                .map(|host| host.trim_start_matches("www.").to_string())
        })
        .unwrap_or_default()
}

/// Turns one association, joined to its page record, into activities.
fn activities_for(
    topic: &str,
    association: &TopicAssociation,
    website: Option<&WebsiteRecord>,
    snippet_max_chars: usize,
) -> Vec<TopicActivity> {
    let title = website
        .and_then(|w| w.title.clone())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| association.url.clone());
    let domain = website
        .and_then(|w| w.domain.clone())
        .unwrap_or_else(|| domain_of(&association.url));

    let activity = |timestamp, activity_type| TopicActivity {
        timestamp,
        activity_type,
        url: association.url.clone(),
        title: title.clone(),
        domain: domain.clone(),
        relevance: association.relevance,
        snippet: None,
        knowledge_chunk: None,
        metadata: None,
    };

    let mut out = Vec::with_capacity(3);

    if let Some(at) = website.and_then(|w| w.bookmark_date) {
        out.push(activity(at, ActivityType::Bookmark));
    }

    if let Some(site) = website
        && let Some(at) = site.visit_date
    {
        let mut visit = activity(at, ActivityType::Visit);
        visit.metadata = Some(serde_json::json!({
            "visitCount": site.visit_count.unwrap_or(1),
        }));
        out.push(visit);
    }

    if let Some(at) = association.extracted_at {
        let source = association
            .knowledge_chunk
            .as_deref()
            .or_else(|| website.and_then(|w| w.summary.as_deref()))
            .or_else(|| website.and_then(|w| w.description.as_deref()));

        let mut extraction = activity(at, ActivityType::Extraction);
        extraction.snippet =
            source.and_then(|text| extract_snippet(text, topic, snippet_max_chars));
        extraction.knowledge_chunk.clone_from(&association.knowledge_chunk);
        extraction.metadata = Some(serde_json::json!({ "matchedTopic": association.topic }));
        out.push(extraction);
    }

    out
}

/// Builds the timeline for one topic.
///
/// # Errors
///
/// Returns an error if the association or page tables cannot be read.
pub fn build_topic_timeline(
    store: &dyn GraphStore,
    topic: &str,
    time_range: &TimeRange,
    max_entries: usize,
    snippet_max_chars: usize,
    requested: bool,
) -> Result<TopicTimeline> {
    let associations = store.find_topic_associations(topic)?;
    if associations.is_empty() {
        tracing::debug!(topic = %topic, "No associations for topic");
        return Ok(TopicTimeline::empty(topic, requested));
    }

    let mut websites: HashMap<String, Option<WebsiteRecord>> = HashMap::new();
    let mut activities = Vec::new();
    for association in &associations {
        if !websites.contains_key(&association.url) {
            let record = store.get_website(&association.url)?;
            websites.insert(association.url.clone(), record);
        }
        let website = websites.get(&association.url).and_then(Option::as_ref);

        activities.extend(
            activities_for(topic, association, website, snippet_max_chars)
                .into_iter()
                .filter(|a| time_range.contains(a.timestamp)),
        );
    }

    let mut activities = dedupe_activities(activities);
    activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let activity_distribution = ActivityDistribution::from_activities(&activities);
    let total_activity = activities.len();
    activities.truncate(max_entries);

    tracing::debug!(
        topic = %topic,
        associations = associations.len(),
        total_activity,
        "Built topic timeline"
    );

    Ok(TopicTimeline {
        topic_name: topic.to_string(),
        activities,
        total_activity,
        activity_distribution,
        requested,
    })
}

/// Builds timelines for every requested topic plus expansion neighbors.
///
/// # Errors
///
/// Returns an error if a requested topic's timeline cannot be built.
/// Failures on neighbor topics are logged and skipped.
pub fn build_timelines(
    store: &dyn GraphStore,
    query: &TimelineQuery,
    config: &GraphConfig,
) -> Result<TimelineSet> {
    let mut seeds: Vec<String> = Vec::with_capacity(query.topics.len());
    for topic in query.topics.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !seeds.iter().any(|s| s == topic) {
            seeds.push(topic.to_string());
        }
    }

    let max_entries = query.max_entries.unwrap_or(config.timeline_max_entries);
    let build = |topic: &str, requested: bool| {
        build_topic_timeline(
            store,
            topic,
            &query.time_range,
            max_entries,
            config.snippet_max_chars,
            requested,
        )
    };

    let mut timelines = seeds
        .iter()
        .map(|topic| build(topic.as_str(), true))
        .collect::<Result<Vec<_>>>()?;

    if query.related_depth > 0 && config.max_neighbor_timelines > 0 {
        let expanded =
            expand_topics(store, &seeds, query.related_depth, config.related_topics_limit);

        let mut neighbors: Vec<TopicTimeline> = expanded
            .iter()
            .filter(|topic| !seeds.contains(topic))
            .filter_map(|topic| match build(topic.as_str(), false) {
                Ok(timeline) => Some(timeline),
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "Skipping neighbor timeline");
                    None
                },
            })
            .filter(|timeline| timeline.total_activity > 0)
            .collect();

        neighbors.sort_by(|a, b| b.total_activity.cmp(&a.total_activity));
        neighbors.truncate(config.max_neighbor_timelines);
        timelines.extend(neighbors);
    }

    timelines.sort_by(|a, b| b.total_activity.cmp(&a.total_activity));
    let metadata = summarize(&timelines);

    Ok(TimelineSet {
        timelines,
        metadata,
    })
}

fn summarize(timelines: &[TopicTimeline]) -> TimelineMetadata {
    let timestamps = || {
        timelines
            .iter()
            .flat_map(|t| t.activities.iter().map(|a| a.timestamp))
    };

    TimelineMetadata {
        earliest: timestamps().min(),
        latest: timestamps().max(),
        topics_with_activity: timelines.iter().filter(|t| t.total_activity > 0).count(),
        total_topics: timelines.len(),
        total_activities: timelines.iter().map(|t| t.total_activity).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryGraphStore;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap()
    }

    fn activity(url: &str, at: DateTime<Utc>, activity_type: ActivityType) -> TopicActivity {
        TopicActivity {
            timestamp: at,
            activity_type,
            url: url.to_string(),
            title: url.to_string(),
            domain: String::new(),
            relevance: 0.5,
            snippet: None,
            knowledge_chunk: None,
            metadata: None,
        }
    }

    #[test]
    fn test_dedupe_prefers_bookmark() {
        let deduped = dedupe_activities(vec![
            activity("a", ts(1), ActivityType::Visit),
            activity("a", ts(1), ActivityType::Bookmark),
            activity("a", ts(1), ActivityType::Extraction),
            activity("a", ts(2), ActivityType::Extraction),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].activity_type, ActivityType::Bookmark);
        assert_eq!(deduped[1].timestamp, ts(2));
    }

    #[test]
    fn test_extract_snippet_first_matching_sentence() {
        let text = "Intro text. Rust ownership prevents data races! More about RUST here.";
        assert_eq!(
            extract_snippet(text, "rust", 200).as_deref(),
            Some("Rust ownership prevents data races!")
        );
        assert_eq!(extract_snippet(text, "python", 200), None);
        assert_eq!(extract_snippet(text, "  ", 200), None);
    }

    #[test]
    fn test_extract_snippet_truncates() {
        let text = format!("rust {}", "x".repeat(300));
        let snippet = extract_snippet(&text, "rust", 200).unwrap();
        assert!(snippet.ends_with(ELLIPSIS));
        assert_eq!(snippet.chars().count(), 200 + ELLIPSIS.len());
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.rust-lang.org/learn"), "rust-lang.org");
        assert_eq!(domain_of("not a url"), "");
    }

    fn timeline_store() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        store
            .insert_association(
                TopicAssociation::new("rust", "https://a.dev/1", 0.9)
                    .extracted_at(ts(3))
                    .with_chunk("Rust is fast. It has no GC."),
            )
            .unwrap();
        store
            .upsert_website(
                WebsiteRecord::new("https://a.dev/1")
                    .with_title("One")
                    .bookmarked_at(ts(1))
                    .visited_at(ts(1), 4),
            )
            .unwrap();
        store
            .insert_association(
                TopicAssociation::new("rust async", "https://b.dev/2", 0.4).extracted_at(ts(5)),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_build_topic_timeline() {
        let store = timeline_store();
        let timeline =
            build_topic_timeline(&store, "Rust", &TimeRange::all(), 50, 200, true).unwrap();

        // Bookmark and visit collide on ts(1): the bookmark survives.
        assert_eq!(timeline.total_activity, 3);
        assert_eq!(timeline.activity_distribution.bookmark, 1);
        assert_eq!(timeline.activity_distribution.visit, 0);
        assert_eq!(timeline.activity_distribution.extraction, 2);

        assert_eq!(timeline.activities[0].timestamp, ts(5));
        assert_eq!(timeline.activities[0].domain, "b.dev");
        assert_eq!(timeline.activities[0].title, "https://b.dev/2");
        assert_eq!(timeline.activities[1].snippet.as_deref(), Some("Rust is fast."));
        assert_eq!(timeline.activities[2].activity_type, ActivityType::Bookmark);
    }

    #[test]
    fn test_distribution_counts_before_truncation() {
        let store = timeline_store();
        let timeline =
            build_topic_timeline(&store, "rust", &TimeRange::all(), 1, 200, true).unwrap();
        assert_eq!(timeline.activities.len(), 1);
        assert_eq!(timeline.total_activity, 3);
        assert_eq!(timeline.activity_distribution.total(), 3);
    }

    #[test]
    fn test_time_range_filters() {
        let store = timeline_store();
        let range = TimeRange {
            start: Some(ts(2)),
            end: Some(ts(4)),
        };
        let timeline = build_topic_timeline(&store, "rust", &range, 50, 200, true).unwrap();
        assert_eq!(timeline.total_activity, 1);
        assert_eq!(timeline.activities[0].timestamp, ts(3));
    }

    #[test]
    fn test_requested_topics_always_present() {
        let store = timeline_store();
        let set = build_timelines(
            &store,
            &TimelineQuery::new(["rust", "haskell"]),
            &GraphConfig::default(),
        )
        .unwrap();

        assert_eq!(set.timelines.len(), 2);
        assert_eq!(set.timelines[0].topic_name, "rust");
        assert_eq!(set.timelines[1].total_activity, 0);
        assert_eq!(set.metadata.topics_with_activity, 1);
        assert_eq!(set.metadata.total_topics, 2);
        assert_eq!(set.metadata.earliest, Some(ts(1)));
        assert_eq!(set.metadata.latest, Some(ts(5)));
    }

    #[test]
    fn test_entry_limit_falls_back_to_config() {
        let store = timeline_store();
        let config = GraphConfig::default().with_timeline_max_entries(2);

        let set = build_timelines(&store, &TimelineQuery::new(["rust"]), &config).unwrap();
        assert_eq!(set.timelines[0].activities.len(), 2);
        assert_eq!(set.timelines[0].total_activity, 3);

        let query = TimelineQuery::new(["rust"]).with_max_entries(1);
        let set = build_timelines(&store, &query, &config).unwrap();
        assert_eq!(set.timelines[0].activities.len(), 1);
    }

    #[test]
    fn test_unknown_topic_is_empty() {
        let store = timeline_store();
        let timeline =
            build_topic_timeline(&store, "haskell", &TimeRange::all(), 50, 200, false).unwrap();
        assert_eq!(timeline.topic_name, "haskell");
        assert!(timeline.activities.is_empty());
        assert_eq!(timeline.total_activity, 0);
        assert!(!timeline.requested);
    }

    #[test]
    fn test_neighbor_timelines_are_capped() {
        let store = InMemoryGraphStore::new();
        let neighbors: Vec<String> = (0..6).map(|i| format!("n{i}")).collect();
        store.set_related_topics("seed", neighbors.clone()).unwrap();
        for (i, topic) in neighbors.iter().enumerate() {
            for j in 0..=i {
                store
                    .insert_association(
                        TopicAssociation::new(
                            topic.as_str(),
                            format!("https://x.dev/{topic}/{j}"),
                            0.5,
                        )
                        .extracted_at(ts(u32::try_from(j + 1).unwrap())),
                    )
                    .unwrap();
            }
        }

        let set = build_timelines(
            &store,
            &TimelineQuery::new(["seed"]).with_related_depth(1),
            &GraphConfig::default(),
        )
        .unwrap();

        assert_eq!(set.timelines.len(), 5);
        assert!(set.timelines.iter().any(|t| t.requested && t.topic_name == "seed"));
        let extra: Vec<&str> = set
            .timelines
            .iter()
            .filter(|t| !t.requested)
            .map(|t| t.topic_name.as_str())
            .collect();
        assert_eq!(extra, vec!["n5", "n4", "n3", "n2"]);
    }
}
