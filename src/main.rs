//! Binary entry point for kgview.
//!
//! Loads a graph snapshot file into an in-memory store and runs one query
//! against it, printing the response as JSON.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use kgview::config::GraphConfig;
use kgview::models::topic::{TimeRange, TimelineQuery};
use kgview::observability::{self, LogFormat, LoggingConfig};
use kgview::services::{
    CircularLayout, GraphCacheService, ImportanceQuery, NeighborhoodQuery, StoreEntitySearch,
};
use kgview::storage::InMemoryGraphStore;
use kgview::{CollectionId, GraphQueryService};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Longest `timeline --days` window accepted.
const MAX_TIMELINE_DAYS: i64 = 36_500;

/// kgview - query a knowledge graph snapshot.
#[derive(Parser)]
#[command(name = "kgview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Graph snapshot file (JSON).
    #[arg(short, long, global = true, env = "KGVIEW_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format (pretty or json).
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Collection name used for the loaded snapshot.
    #[arg(long, global = true, default_value = "default")]
    collection: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show the neighborhood of an entity.
    Neighborhood {
        /// Entity name or ID.
        entity: String,

        /// Maximum BFS depth.
        #[arg(short, long)]
        depth: Option<usize>,

        /// Maximum neighbors returned.
        #[arg(short = 'n', long)]
        max_nodes: Option<usize>,
    },

    /// Show the most important entities.
    Importance {
        /// Entity budget.
        #[arg(short = 'n', long)]
        max_nodes: Option<usize>,

        /// Skip connectivity repair.
        #[arg(long)]
        no_connectivity: bool,

        /// Include a computed layout.
        #[arg(long)]
        layout: bool,
    },

    /// Show activity timelines for topics.
    Timeline {
        /// Topics to build timelines for.
        #[arg(required = true)]
        topics: Vec<String>,

        /// Related topic expansion depth (0 disables).
        #[arg(long, default_value = "1")]
        related_depth: u32,

        /// Only include activity from the last N days.
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_TIMELINE_DAYS))]
        days: Option<i64>,

        /// Entries shown per timeline.
        #[arg(long)]
        max_entries: Option<usize>,
    },

    /// Show topic hierarchy nodes and relationships.
    Topics {
        /// Topic IDs (all topics when omitted).
        topic_ids: Vec<String>,

        /// Minimum relationship strength.
        #[arg(long, default_value = "0.0")]
        min_strength: f64,
    },

    /// Show graph statistics.
    Stats,
}

fn main() -> ExitCode {
    // Missing .env is the common case.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging = logging.with_format(format);
    }
    if let Err(e) = observability::init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration: explicit file, else the user config dir, then env overrides.
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GraphConfig> {
    let config = match path {
        Some(path) => GraphConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GraphConfig::load_default(),
    };
    Ok(config.with_env_overrides())
}

/// Runs the selected command.
fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let snapshot = cli
        .snapshot
        .as_ref()
        .context("no snapshot file given (use --snapshot or KGVIEW_SNAPSHOT)")?;
    let store = Arc::new(
        InMemoryGraphStore::load_snapshot(snapshot)
            .with_context(|| format!("loading snapshot from {}", snapshot.display()))?,
    );

    let cache = GraphCacheService::new(config)
        .with_layout_engine(Arc::new(CircularLayout::default()));
    let service = GraphQueryService::with_cache(Arc::new(cache))
        .with_search(Arc::new(StoreEntitySearch::new(store.clone())));
    let collection = CollectionId::new(cli.collection);
    let opened = service.open_collection(collection.clone(), store);
    if let Some(error) = opened.error {
        anyhow::bail!(error);
    }

    match cli.command {
        Commands::Neighborhood {
            entity,
            depth,
            max_nodes,
        } => {
            let mut query = NeighborhoodQuery::new(entity);
            query.max_depth = depth;
            query.max_nodes = max_nodes;
            print_json(&service.entity_neighborhood(&collection, &query))
        },

        Commands::Importance {
            max_nodes,
            no_connectivity,
            layout,
        } => {
            let query = ImportanceQuery {
                max_nodes,
                include_connectivity: no_connectivity.then_some(false),
            };
            if layout {
                print_json(&service.importance_layout(&collection, &query))
            } else {
                print_json(&service.global_importance_layer(&collection, &query))
            }
        },

        Commands::Timeline {
            topics,
            related_depth,
            days,
            max_entries,
        } => {
            let mut query = TimelineQuery::new(topics).with_related_depth(related_depth);
            if let Some(days) = days {
                query = query.with_time_range(TimeRange::last_days(days, chrono::Utc::now()));
            }
            if let Some(max_entries) = max_entries {
                query = query.with_max_entries(max_entries);
            }
            print_json(&service.topic_timelines(&collection, &query))
        },

        Commands::Topics {
            topic_ids,
            min_strength,
        } => print_json(&service.topic_graph(&collection, &topic_ids, min_strength)),

        Commands::Stats => print_json(&service.graph_stats(&collection)),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_days_range() {
        let parse =
            |days: &str| Cli::try_parse_from(["kgview", "timeline", "rust", "--days", days]);

        let cli = parse("30").unwrap();
        assert!(matches!(cli.command, Commands::Timeline { days: Some(30), .. }));

        assert!(parse("0").is_err());
        assert!(parse("9223372036854775807").is_err());
    }
}
