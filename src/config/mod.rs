//! Configuration management.
//!
//! [`GraphConfig`] holds the tunables for cache builds and queries. Values
//! come from, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`[graph]` table)
//! 3. `KGVIEW_<FIELD>` environment variables
//!
//! ```toml
//! [graph]
//! entity_fetch_limit = 2000
//! importance_max_nodes = 300
//! include_connectivity = true
//! ```

use serde::Deserialize;
use std::path::Path;

// Graph configuration defaults
/// Maximum entities fetched per cache build.
pub const DEFAULT_ENTITY_FETCH_LIMIT: usize = 5000;
/// Default importance layer budget.
pub const DEFAULT_IMPORTANCE_MAX_NODES: usize = 500;
/// Default share of the importance budget held back for bridge nodes.
pub const DEFAULT_BRIDGE_RESERVE_RATIO: f64 = 0.1;
/// Default BFS depth.
pub const DEFAULT_NEIGHBORHOOD_MAX_DEPTH: usize = 2;
/// Default BFS neighbor budget.
pub const DEFAULT_NEIGHBORHOOD_MAX_NODES: usize = 50;
/// Default per-timeline display truncation.
pub const DEFAULT_TIMELINE_MAX_ENTRIES: usize = 50;
/// Extra timelines added from topic expansion.
pub const DEFAULT_MAX_NEIGHBOR_TIMELINES: usize = 4;
/// Related topics fetched per seed topic.
pub const DEFAULT_RELATED_TOPICS_LIMIT: usize = 10;
/// Extraction snippet truncation, in characters.
pub const DEFAULT_SNIPPET_MAX_CHARS: usize = 200;
/// Relationship sources shown per relationship.
pub const DEFAULT_SOURCE_DISPLAY_LIMIT: usize = 3;
/// Computed layouts kept per collection.
pub const DEFAULT_LAYOUT_CACHE_CAPACITY: usize = 16;

/// Tunables for graph cache builds and queries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Maximum entities fetched per cache build.
    pub entity_fetch_limit: usize,
    /// Default importance layer budget.
    pub importance_max_nodes: usize,
    /// Whether the importance layer repairs connectivity by default.
    pub include_connectivity: bool,
    /// Share of the importance budget held back for bridge nodes (0.0 to 0.5).
    pub bridge_reserve_ratio: f64,
    /// Default BFS depth.
    pub neighborhood_max_depth: usize,
    /// Default BFS neighbor budget.
    pub neighborhood_max_nodes: usize,
    /// Per-timeline display truncation.
    pub timeline_max_entries: usize,
    /// Extra timelines added from topic expansion.
    pub max_neighbor_timelines: usize,
    /// Related topics fetched per seed topic.
    pub related_topics_limit: usize,
    /// Extraction snippet truncation, in characters.
    pub snippet_max_chars: usize,
    /// Relationship sources shown per relationship.
    pub source_display_limit: usize,
    /// Computed layouts kept per collection.
    pub layout_cache_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            entity_fetch_limit: DEFAULT_ENTITY_FETCH_LIMIT,
            importance_max_nodes: DEFAULT_IMPORTANCE_MAX_NODES,
            include_connectivity: true,
            bridge_reserve_ratio: DEFAULT_BRIDGE_RESERVE_RATIO,
            neighborhood_max_depth: DEFAULT_NEIGHBORHOOD_MAX_DEPTH,
            neighborhood_max_nodes: DEFAULT_NEIGHBORHOOD_MAX_NODES,
            timeline_max_entries: DEFAULT_TIMELINE_MAX_ENTRIES,
            max_neighbor_timelines: DEFAULT_MAX_NEIGHBOR_TIMELINES,
            related_topics_limit: DEFAULT_RELATED_TOPICS_LIMIT,
            snippet_max_chars: DEFAULT_SNIPPET_MAX_CHARS,
            source_display_limit: DEFAULT_SOURCE_DISPLAY_LIMIT,
            layout_cache_capacity: DEFAULT_LAYOUT_CACHE_CAPACITY,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    graph: Option<GraphConfig>,
}

impl GraphConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entity fetch limit.
    #[must_use]
    pub const fn with_entity_fetch_limit(mut self, limit: usize) -> Self {
        self.entity_fetch_limit = limit;
        self
    }

    /// Sets the default importance layer budget.
    #[must_use]
    pub const fn with_importance_max_nodes(mut self, max: usize) -> Self {
        self.importance_max_nodes = max;
        self
    }

    /// Sets the bridge reserve ratio, clamped to 0.0..=0.5.
    #[must_use]
    pub fn with_bridge_reserve_ratio(mut self, ratio: f64) -> Self {
        self.bridge_reserve_ratio = ratio.clamp(0.0, 0.5);
        self
    }

    /// Sets the per-timeline display truncation.
    #[must_use]
    pub const fn with_timeline_max_entries(mut self, max: usize) -> Self {
        self.timeline_max_entries = max;
        self
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this structure.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| crate::Error::operation("parse_config_file", e))?;
        Ok(file.graph.unwrap_or_default().sanitized())
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::operation("read_config_file", e))?;
        Self::from_toml(&contents)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/kgview/` on macOS)
    /// 2. XDG config dir (`~/.config/kgview/`)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("kgview").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("kgview")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring unreadable config file"
                    );
                },
            }
        }

        Self::default()
    }

    /// Applies `KGVIEW_<FIELD>` environment overrides.
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let usize_var = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        if let Some(v) = usize_var("KGVIEW_ENTITY_FETCH_LIMIT") {
            self.entity_fetch_limit = v;
        }
        if let Some(v) = usize_var("KGVIEW_IMPORTANCE_MAX_NODES") {
            self.importance_max_nodes = v;
        }
        if let Some(v) = lookup("KGVIEW_INCLUDE_CONNECTIVITY").and_then(|v| parse_bool(&v)) {
            self.include_connectivity = v;
        }
        if let Some(v) =
            lookup("KGVIEW_BRIDGE_RESERVE_RATIO").and_then(|v| v.trim().parse::<f64>().ok())
        {
            self.bridge_reserve_ratio = v;
        }
        if let Some(v) = usize_var("KGVIEW_NEIGHBORHOOD_MAX_DEPTH") {
            self.neighborhood_max_depth = v;
        }
        if let Some(v) = usize_var("KGVIEW_NEIGHBORHOOD_MAX_NODES") {
            self.neighborhood_max_nodes = v;
        }
        if let Some(v) = usize_var("KGVIEW_TIMELINE_MAX_ENTRIES") {
            self.timeline_max_entries = v;
        }
        if let Some(v) = usize_var("KGVIEW_MAX_NEIGHBOR_TIMELINES") {
            self.max_neighbor_timelines = v;
        }
        if let Some(v) = usize_var("KGVIEW_RELATED_TOPICS_LIMIT") {
            self.related_topics_limit = v;
        }
        if let Some(v) = usize_var("KGVIEW_SNIPPET_MAX_CHARS") {
            self.snippet_max_chars = v;
        }
        if let Some(v) = usize_var("KGVIEW_SOURCE_DISPLAY_LIMIT") {
            self.source_display_limit = v;
        }
        if let Some(v) = usize_var("KGVIEW_LAYOUT_CACHE_CAPACITY") {
            self.layout_cache_capacity = v;
        }

        self.sanitized()
    }

    /// Replaces out-of-range values with defaults.
    fn sanitized(mut self) -> Self {
        if self.entity_fetch_limit == 0 {
            self.entity_fetch_limit = DEFAULT_ENTITY_FETCH_LIMIT;
        }
        if !(0.0..=0.5).contains(&self.bridge_reserve_ratio) {
            tracing::warn!(
                ratio = self.bridge_reserve_ratio,
                "bridge_reserve_ratio out of range, using default"
            );
            self.bridge_reserve_ratio = DEFAULT_BRIDGE_RESERVE_RATIO;
        }
        if self.layout_cache_capacity == 0 {
            self.layout_cache_capacity = DEFAULT_LAYOUT_CACHE_CAPACITY;
        }
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
