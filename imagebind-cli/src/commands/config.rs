//! `config` command: print the effective configuration.

use std::path::Path;

use crate::commands::load_config;
use crate::error::CliError;

/// Print the configuration that `replay` would use.
pub fn run(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;

    match path {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# Built-in defaults"),
    }
    print!("{}", config.to_ini_string());

    Ok(())
}
