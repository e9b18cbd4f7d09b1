//! Status command implementation

use std::path::Path;

use colored::Colorize;
use modsync_core::{ModuleState, SyncEngine};

use crate::cli::StatusArgs;
use crate::commands::Context;
use crate::error::Result;

/// Run the status command
pub fn run_status(config_path: &Path, args: &StatusArgs) -> Result<()> {
    let context = Context::load(config_path, &args.roots)?;
    let engine = SyncEngine::builder(context.registry()?)
        .sync_root(&context.sync_root)
        .cache_root(&context.cache_root)
        .build()?;
    let modules = engine.status()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    println!("{}", "Module Status".bold());
    println!();
    println!("{}:  {}", "Root".dimmed(), engine.sync_root().display());
    println!("{}: {}", "Cache".dimmed(), engine.cache_root().display());
    println!();

    if modules.is_empty() {
        println!("  {} (run {} first)", "None".dimmed(), "modsync sync".cyan());
        return Ok(());
    }

    for module in &modules {
        let state = match module.state {
            ModuleState::Clean => "clean".green(),
            ModuleState::Modified => "modified".yellow(),
            ModuleState::Linked => "linked".cyan(),
            ModuleState::Missing => "missing".red(),
        };
        println!(
            "  {} {} ({}) {}",
            "+".green(),
            module.origin.cyan(),
            state,
            module.fingerprint.dimmed()
        );
    }
    Ok(())
}
