//! Error types for modsync-git

use std::path::PathBuf;

use modsync_core::RegistryError;

/// Result type for modsync-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in modsync-git operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Filesystem error: {0}")]
    Fs(#[from] modsync_fs::Error),

    #[error("No repository for '{origin}' at {url}")]
    OriginNotFound { origin: String, url: String },

    #[error("Revision '{revision}' not found in '{origin}'")]
    RevisionNotFound { origin: String, revision: String },

    #[error("Failed to write snapshot file {path}: {source}")]
    Checkout {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<Error> for RegistryError {
    fn from(err: Error) -> Self {
        match err {
            Error::OriginNotFound { origin, .. } => RegistryError::UnknownOrigin { origin },
            Error::RevisionNotFound { origin, revision } => {
                RegistryError::UnknownRevision { origin, revision }
            }
            Error::Checkout { path, source } => RegistryError::Io { path, source },
            other => RegistryError::Backend(other.to_string()),
        }
    }
}
