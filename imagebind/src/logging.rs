//! Tracing subscriber setup.
//!
//! Library code only emits events through `tracing`; binaries decide where
//! they go by calling [`init_logging`] once at startup.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Level used when neither `RUST_LOG` nor a caller override is set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Failure to install the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Build the filter: `RUST_LOG` wins, otherwise `default_level`.
pub fn build_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level).map_err(|e| LoggingError::InvalidFilter {
            filter: default_level.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Install a `fmt` subscriber writing to stderr.
///
/// # Errors
///
/// Returns [`LoggingError::AlreadyInstalled`] if called twice in one process.
pub fn init_logging(default_level: &str) -> Result<(), LoggingError> {
    let filter = build_filter(default_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)
}
