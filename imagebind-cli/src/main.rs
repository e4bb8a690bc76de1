//! imagebind CLI - Command-line interface
//!
//! Replays recorded host lifecycle traces against the attachment controller
//! and inspects the ambient configuration.

mod commands;
mod error;
mod trace;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use imagebind::logging;

use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "imagebind")]
#[command(version, about = "Lifecycle-driven image attachment controller", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON lifecycle trace and report fetch/release counts
    Replay(commands::replay::ReplayArgs),

    /// Print the effective configuration in INI form
    Config {
        /// INI configuration file (defaults apply if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let level = if cli.verbose {
        "debug"
    } else {
        logging::DEFAULT_LOG_LEVEL
    };
    logging::init_logging(level)?;

    match cli.command {
        Commands::Replay(args) => commands::replay::run(args),
        Commands::Config { config } => commands::config::run(config.as_deref()),
    }
}
