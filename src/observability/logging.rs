//! Structured logging.

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Default filter when neither `KGVIEW_LOG` nor `RUST_LOG` is set.
const DEFAULT_FILTER: &str = "kgview=info";

/// Verbose filter used by `--verbose`.
const VERBOSE_FILTER: &str = "kgview=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Builds a config from `KGVIEW_LOG_FORMAT`, `KGVIEW_LOG`, and `RUST_LOG`.
    ///
    /// `verbose` raises the default filter to debug; explicit filter
    /// variables still win.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    fn from_lookup(verbose: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = lookup("KGVIEW_LOG_FORMAT")
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();

        let filter = lookup("KGVIEW_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| {
                if verbose {
                    VERBOSE_FILTER.to_string()
                } else {
                    DEFAULT_FILTER.to_string()
                }
            });

        Self { format, filter }
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the parsed filter, falling back to the default on bad directives.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}
