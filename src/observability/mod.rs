//! Observability and telemetry.
//!
//! The library only emits `tracing` events and `metrics` samples. Installing
//! a subscriber (and any metrics exporter) is the embedding process's job;
//! [`init_logging`] covers the common case used by the `kgview` binary.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `graph_cache_requests_total` | counter | `result` |
//! | `graph_cache_builds_total` | counter | `status` |
//! | `graph_cache_build_duration_ms` | histogram | |
//! | `graph_cache_invalidations_total` | counter | |
//! | `graph_query_duration_ms` | histogram | `operation` |

mod logging;

pub use logging::{LogFormat, LoggingConfig};

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a global `tracing` subscriber writing to stderr.
///
/// # Errors
///
/// Returns an error if logging has already been initialized or another
/// global subscriber is installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "logging_init".to_string(),
            cause: "logging already initialized".to_string(),
        });
    }

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true),
                )
                .with(config.env_filter())
                .try_init()
                .map_err(init_error)?;
        },
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_target(true),
                )
                .with(config.env_filter())
                .try_init()
                .map_err(init_error)?;
        },
    }

    LOGGING_INIT.set(()).map_err(|()| Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: "failed to mark logging initialized".to_string(),
    })
}

fn init_error(err: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: err.to_string(),
    }
}
