//! CLI command implementations.

pub mod config;
pub mod replay;

use std::path::Path;

use imagebind::AmbientConfig;

use crate::error::CliError;

/// Load the ambient configuration from `path`, or use defaults.
pub fn load_config(path: Option<&Path>) -> Result<AmbientConfig, CliError> {
    match path {
        Some(path) => Ok(AmbientConfig::load(path)?),
        None => Ok(AmbientConfig::default()),
    }
}
