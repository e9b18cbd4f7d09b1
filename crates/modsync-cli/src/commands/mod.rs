//! Command implementations for modsync-cli

pub mod status;
pub mod sync;

pub use status::run_status;
pub use sync::run_sync;

use std::path::{Path, PathBuf};

use modsync_core::{DirectoryRegistry, ProjectConfig, Registry, RegistryKind};
use modsync_git::GitRegistry;

use crate::cli::RootArgs;
use crate::error::{CliError, Result};

/// Configuration with command-line overrides applied.
pub(crate) struct Context {
    pub config: ProjectConfig,
    pub sync_root: PathBuf,
    pub cache_root: PathBuf,
}

impl Context {
    pub(crate) fn load(config_path: &Path, roots: &RootArgs) -> Result<Self> {
        let config = ProjectConfig::load(config_path)?;
        let sync_root = roots.root.clone().unwrap_or_else(|| config.sync_root());
        let cache_root = roots.cache_dir.clone().unwrap_or_else(|| config.cache_root());
        tracing::debug!(
            config = %config_path.display(),
            sync_root = %sync_root.display(),
            cache_root = %cache_root.display(),
            "Loaded configuration"
        );
        Ok(Self {
            config,
            sync_root,
            cache_root,
        })
    }

    /// Registry named by the `[registry]` section.
    pub(crate) fn registry(&self) -> Result<Box<dyn Registry>> {
        let (Some(section), Some(location)) =
            (self.config.registry.as_ref(), self.config.registry_location())
        else {
            return Err(CliError::user(
                "No [registry] section in the configuration; add one with a `location`",
            ));
        };
        Ok(match section.kind {
            RegistryKind::Directory => Box::new(DirectoryRegistry::new(location)),
            RegistryKind::Git => Box::new(GitRegistry::new(location).with_cache_root(&self.cache_root)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("modsync.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn flags_override_configured_roots() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            temp.path(),
            "dependencies = []\n\n[sync]\nroot = \"vendor\"\ncache_root = \"cache\"\n",
        );

        let configured = Context::load(&path, &RootArgs::default()).unwrap();
        assert_eq!(configured.sync_root, temp.path().join("vendor"));
        assert_eq!(configured.cache_root, temp.path().join("cache"));

        let overrides = RootArgs {
            root: Some(PathBuf::from("/elsewhere/root")),
            cache_dir: Some(PathBuf::from("/elsewhere/cache")),
        };
        let overridden = Context::load(&path, &overrides).unwrap();
        assert_eq!(overridden.sync_root, PathBuf::from("/elsewhere/root"));
        assert_eq!(overridden.cache_root, PathBuf::from("/elsewhere/cache"));
    }

    #[test]
    fn missing_registry_is_a_user_error() {
        let temp = TempDir::new().unwrap();
        let path = write_config(temp.path(), "dependencies = []\n");
        let context = Context::load(&path, &RootArgs::default()).unwrap();

        let err = context.registry().err().unwrap();
        assert!(matches!(err, CliError::User { .. }));
    }

    #[test]
    fn missing_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let err = Context::load(&temp.path().join("modsync.toml"), &RootArgs::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CliError::Core(modsync_core::Error::ConfigNotFound { .. })
        ));
    }
}
