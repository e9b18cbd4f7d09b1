//! Error types for modsync-core

use std::path::PathBuf;

use crate::registry::RegistryError;

/// Result type for modsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while synchronizing modules
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed origin id, illegal module name or destination name
    #[error("Invalid dependency '{origin}': {reason}")]
    InvalidDependency { origin: String, reason: String },

    /// A revision that is not a local path and is not a legal remote label
    #[error(
        "Revision '{revision}' of '{origin}' is treated as remote because no such path exists, \
         but it contains the illegal character '{illegal}'"
    )]
    InvalidRevision {
        origin: String,
        revision: String,
        illegal: char,
    },

    /// A local revision that is not a directory or points into the sync root
    #[error("Invalid local revision {path} for '{origin}': {reason}")]
    InvalidLocalRevision {
        origin: String,
        path: PathBuf,
        reason: String,
    },

    /// Persisted manifest could not be parsed
    #[error("Corrupt manifest {path} at line {line}: {reason}")]
    ManifestCorrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Registry, network or filesystem failure while fetching a module
    #[error("Failed to fetch '{origin}': {reason}")]
    FetchFailed { origin: String, reason: String },

    /// A pristine snapshot contains something that is neither file nor directory
    #[error("Invalid cache entry {path}: not a file, directory or valid link")]
    InvalidCacheEntry { path: PathBuf },

    /// A synced module does not ship its requirements file
    #[error("Every synced module must ship {path}, but it is missing for '{origin}'")]
    MissingRequirementsFile { origin: String, path: PathBuf },

    /// A requirements file entry that cannot be parsed
    #[error("Invalid requirement in {path} at line {line}: {reason}")]
    InvalidRequirement {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Package installation for a module exited unsuccessfully
    #[error("Installing requirements for '{origin}' failed (exit code: {exit_code:?})")]
    InstallFailed {
        origin: String,
        exit_code: Option<i32>,
    },

    /// The sync root path exists but is not a directory
    #[error("Sync root {path} exists but is not a directory")]
    SyncRootNotDirectory { path: PathBuf },

    /// Project configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Project configuration present but not usable
    #[error("Invalid configuration {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// Filesystem error from modsync-fs
    #[error(transparent)]
    Fs(#[from] modsync_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    /// Wrap a registry failure for `origin` as a fetch failure.
    pub fn fetch(origin: impl std::fmt::Display, source: RegistryError) -> Self {
        Self::FetchFailed {
            origin: origin.to_string(),
            reason: source.to_string(),
        }
    }

    /// The origin id this error names, if any.
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::InvalidDependency { origin, .. }
            | Self::InvalidRevision { origin, .. }
            | Self::InvalidLocalRevision { origin, .. }
            | Self::FetchFailed { origin, .. }
            | Self::MissingRequirementsFile { origin, .. }
            | Self::InstallFailed { origin, .. } => Some(origin),
            _ => None,
        }
    }
}
