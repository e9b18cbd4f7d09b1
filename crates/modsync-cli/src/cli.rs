//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use modsync_core::config::CONFIG_FILE;

/// modsync - Synchronize module dependencies into your project
#[derive(Parser, Debug)]
#[command(name = "modsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Synchronize every dependency listed in the configuration
    ///
    /// Prints the sync location of each dependency, one per line.
    ///
    /// Examples:
    ///   modsync sync                      # Prompt before touching edited modules
    ///   modsync sync --overwrite --yes    # Refetch everything unattended
    ///   modsync sync --json               # Machine-readable report
    Sync(SyncArgs),

    /// Show the state of every synced module
    Status(StatusArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Overrides for the roots configured in the project file
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RootArgs {
    /// Sync root (defaults to `synced_modules` next to the configuration)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Shared cache root
    #[arg(long, env = "MODSYNC_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncArgs {
    #[command(flatten)]
    pub roots: RootArgs,

    /// Refetch every dependency, discarding local edits after confirmation
    #[arg(long)]
    pub overwrite: bool,

    /// Answer every prompt with yes
    #[arg(short, long)]
    pub yes: bool,

    /// Do not check or install module requirements
    #[arg(long)]
    pub skip_requirements: bool,

    /// Python interpreter used to install requirements
    #[arg(long, env = "MODSYNC_PYTHON")]
    pub python: Option<PathBuf>,

    /// Output as JSON for scripting
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusArgs {
    #[command(flatten)]
    pub roots: RootArgs,

    /// Output as JSON for scripting
    #[arg(long)]
    pub json: bool,
}
