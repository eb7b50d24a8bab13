//! Topic neighborhood expansion.
//!
//! Unions each seed topic with the topics the related-topics index lists for
//! it. Expansion is one hop: any depth of one or more behaves like one, and
//! depth zero disables expansion.

use crate::storage::GraphStore;

/// Expands `seeds` with up to `limit` related topics per seed.
///
/// Seeds come first, in order, followed by newly discovered topics in
/// discovery order. Duplicates are dropped (case-sensitive). A seed whose
/// lookup fails is logged and contributes nothing.
#[must_use]
pub fn expand_topics(
    store: &dyn GraphStore,
    seeds: &[String],
    depth: u32,
    limit: usize,
) -> Vec<String> {
    let mut topics: Vec<String> = Vec::with_capacity(seeds.len());
    for seed in seeds {
        if !topics.contains(seed) {
            topics.push(seed.clone());
        }
    }

    if depth == 0 {
        return topics;
    }
    if depth > 1 {
        tracing::debug!(depth, "Topic expansion is single-hop, treating depth as 1");
    }

    let mut failures = 0usize;
    for seed in seeds {
        match store.get_related_topics(seed, limit) {
            Ok(related) => {
                for topic in related {
                    if !topics.contains(&topic) {
                        topics.push(topic);
                    }
                }
            },
            Err(e) => {
                failures += 1;
                tracing::warn!(topic = %seed, error = %e, "Related topic lookup failed");
            },
        }
    }

    if failures > 0 && failures == seeds.len() {
        tracing::warn!(seeds = seeds.len(), "Topic expansion failed for every seed");
    }

    topics
}
