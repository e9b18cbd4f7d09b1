//! Project configuration
//!
//! Loads the `modsync.toml` project file:
//!
//! ```toml
//! [sync]
//! root = "synced_modules"
//! overwrite = false
//!
//! [registry]
//! kind = "git"
//! location = "https://git.example.com"
//!
//! [[dependencies]]
//! origin = "acme/widgets"
//! revision = "main"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache;
use crate::validate::DependencyRequest;
use crate::{Error, Result};

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "modsync.toml";

/// Default name of the sync root folder.
pub const SYNC_FOLDER: &str = "synced_modules";

/// Which registry backend serves remote modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// Plain directory tree of published revisions
    #[default]
    Directory,
    /// Git repositories, one per origin
    Git,
}

impl FromStr for RegistryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "directory" | "dir" => Ok(Self::Directory),
            "git" => Ok(Self::Git),
            _ => Err(format!("unknown registry kind '{s}', expected 'directory' or 'git'")),
        }
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::Git => write!(f, "git"),
        }
    }
}

/// `[sync]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSection {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_true")]
    pub install_requirements: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            root: None,
            cache_root: None,
            overwrite: false,
            install_requirements: true,
        }
    }
}

/// `[registry]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    #[serde(default)]
    pub kind: RegistryKind,
    /// Directory root, or git base URL / base path
    pub location: String,
}

/// Parsed `modsync.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub registry: Option<RegistrySection>,
    pub dependencies: Vec<DependencyRequest>,
    /// Directory the file was loaded from
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ProjectConfig {
    /// Load and parse the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| modsync_fs::Error::io(path, e))?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&text, base_dir).map_err(|reason| Error::InvalidConfig {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Parse configuration text; relative paths resolve against `base_dir`.
    pub fn parse(text: &str, base_dir: impl Into<PathBuf>) -> std::result::Result<Self, String> {
        let mut config: Self = toml::from_str(text).map_err(|e| e.message().to_string())?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Sync root, defaulting to `<base>/synced_modules`.
    pub fn sync_root(&self) -> PathBuf {
        match &self.sync.root {
            Some(root) => self.resolve(root),
            None => self.base_dir.join(SYNC_FOLDER),
        }
    }

    /// Cache root, defaulting to the user cache directory.
    pub fn cache_root(&self) -> PathBuf {
        match &self.sync.cache_root {
            Some(root) => self.resolve(root),
            None => cache::default_cache_root(),
        }
    }

    /// Registry location with relative paths resolved. URLs are returned as-is.
    pub fn registry_location(&self) -> Option<String> {
        let registry = self.registry.as_ref()?;
        if registry.location.contains("://") {
            return Some(registry.location.clone());
        }
        Some(self.resolve(Path::new(&registry.location)).display().to_string())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
