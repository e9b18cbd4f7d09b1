//! modsync CLI
//!
//! Synchronizes the module dependencies listed in `modsync.toml` into the
//! project's sync root.

mod cli;
mod commands;
mod error;
mod interactive;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sync(args) => commands::run_sync(&cli.config, &args),
        Commands::Status(args) => commands::run_status(&cli.config, &args),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "modsync", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` when set.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
    if verbose {
        tracing::debug!("Verbose mode enabled");
    }
}
