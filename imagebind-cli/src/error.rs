//! CLI error type.

use std::path::PathBuf;

use imagebind::logging::LoggingError;
use imagebind::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse trace {}: {source}", path.display())]
    TraceParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("Leak detected: {open_handles} open prefetch handle(s), {attached} primary attachment(s)")]
    Leak { open_handles: usize, attached: usize },
}
