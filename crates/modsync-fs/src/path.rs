//! Normalized path handling for manifest-stable path strings

use std::path::{Path, PathBuf};

/// A path normalized to use forward slashes internally.
///
/// Manifest lines store paths relative to the sync root, and those must read
/// the same on every platform. `NormalizedPath` keeps a forward-slash string
/// and only converts to a native `PathBuf` at I/O boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    ///
    /// Backslashes become forward slashes and a trailing slash is dropped
    /// (except for the root itself).
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        let mut normalized = path_str.replace('\\', "/");
        while normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }
        Self { inner: normalized }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Express this path relative to `base`, component-wise.
    ///
    /// Returns `None` when `self` is not located under `base`. A path equal
    /// to `base` yields an empty relative path.
    pub fn relative_to(&self, base: &NormalizedPath) -> Option<Self> {
        if base.inner == "/" {
            return self
                .inner
                .strip_prefix('/')
                .map(|rest| Self { inner: rest.to_string() });
        }
        let rest = self.inner.strip_prefix(base.as_str())?;
        if rest.is_empty() {
            return Some(Self {
                inner: String::new(),
            });
        }
        rest.strip_prefix('/').map(|rest| Self {
            inner: rest.to_string(),
        })
    }

    /// Check if this path exists on the filesystem (following links).
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}
