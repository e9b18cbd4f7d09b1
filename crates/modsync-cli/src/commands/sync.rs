//! Sync command implementation

use std::path::Path;

use modsync_core::{AutoConfirm, PipEnvironment, RequirementsInstaller, SyncEngine};

use crate::cli::SyncArgs;
use crate::commands::Context;
use crate::error::Result;
use crate::interactive::DialoguerConfirm;

const CALLER: &str = "modsync sync";

/// Run the sync command
pub fn run_sync(config_path: &Path, args: &SyncArgs) -> Result<()> {
    let context = Context::load(config_path, &args.roots)?;
    let mut builder = SyncEngine::builder(context.registry()?)
        .sync_root(&context.sync_root)
        .cache_root(&context.cache_root);

    builder = if args.yes {
        builder.confirm(AutoConfirm(true))
    } else {
        builder.confirm(DialoguerConfirm)
    };

    if args.skip_requirements || !context.config.sync.install_requirements {
        tracing::debug!("Requirements hook disabled");
    } else {
        let environment = match &args.python {
            Some(python) => PipEnvironment::new(python),
            None => PipEnvironment::default(),
        };
        builder = builder.post_sync_hook(RequirementsInstaller::new(environment));
    }

    let engine = builder.build()?;
    let overwrite = args.overwrite || context.config.sync.overwrite;
    let report = engine.sync_report(&context.config.dependencies, overwrite, CALLER)?;

    if args.json {
        let output = serde_json::json!({
            "sync_root": engine.sync_root(),
            "manifest": engine.manifest_path(),
            "fetched": report.fetched(),
            "modules": report.entries,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for entry in &report.entries {
            println!("{}", entry.sync_location.display());
        }
    }
    Ok(())
}
