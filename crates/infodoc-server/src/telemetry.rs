//! Tracing subscriber setup

use crate::config::{LogConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor `log.filter` is set
pub const DEFAULT_FILTER: &str = "info,infodoc=debug";

/// Build the event filter
///
/// `RUST_LOG` wins over `log.filter`, which wins over [`DEFAULT_FILTER`].
///
/// # Errors
/// Returns error if the configured directives do not parse
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = config.filter.as_deref().unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directives).map_err(|e| TelemetryError::Filter {
        directives: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber
///
/// # Errors
/// Returns error if the filter is invalid or a subscriber is already set
pub fn init(config: &LogConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| TelemetryError::Install(e.to_string()))
}

/// Logging could not be set up
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Invalid filter directives
    #[error("invalid log filter {directives:?}: {reason}")]
    Filter { directives: String, reason: String },

    /// Global subscriber already installed
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}
