//! Tracing subscriber setup for the experiment binary.
//!
//! Filter directives come from `LoggingConfig::directives`, then `RUST_LOG`,
//! then `LoggingConfig::default_directive`. Logs go to stderr so that the
//! experiment report on stdout stays clean.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt as tracing_fmt};

/// Output format of the formatter layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Parses `pretty`, `compact` or `json`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit directives such as `qteleport=debug`. Overrides `RUST_LOG`.
    pub directives: Option<String>,
    pub default_directive: String,
    pub format: LogFormat,
    pub ansi: bool,
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            format: LogFormat::default(),
            ansi: true,
            include_targets: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),
}

impl LoggingConfig {
    fn resolve_filter(&self) -> Result<EnvFilter, LoggingError> {
        match &self.directives {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|err| LoggingError::InvalidFilter(err.to_string())),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive.clone()))),
        }
    }
}

fn format_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    match config.format {
        LogFormat::Pretty => Box::new(
            tracing_fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(config.include_targets)
                .with_ansi(config.ansi),
        ),
        LogFormat::Compact => Box::new(
            tracing_fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(config.include_targets)
                .with_ansi(config.ansi),
        ),
        LogFormat::Json => Box::new(
            tracing_fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(config.include_targets)
                .with_ansi(false),
        ),
    }
}

/// Installs the global subscriber.
///
/// Calling this more than once is a no-op: the first installed subscriber stays.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.resolve_filter()?;
    let installed = Registry::default()
        .with(format_layer(config))
        .with(filter)
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}
