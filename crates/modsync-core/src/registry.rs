//! Registry abstraction and a directory-backed implementation
//!
//! A registry is the content-addressable fetch service modules come from.
//! The engine only talks to it through [`Registry`]; calls may be slow and
//! may fail.

use std::fs;
use std::path::{Path, PathBuf};

use modsync_fs::{checksum, io};

use crate::cache;
use crate::descriptor::OriginId;

/// Failures reported by a registry backend.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown origin '{origin}'")]
    UnknownOrigin { origin: String },

    #[error("unknown revision '{revision}' of '{origin}'")]
    UnknownRevision { origin: String, revision: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Backend(String),
}

impl RegistryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<modsync_fs::Error> for RegistryError {
    fn from(err: modsync_fs::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// A pristine snapshot in the shared cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// `<cache_root>/modules--<ns>--<name>/snapshots/<fingerprint>`
    pub path: PathBuf,
    pub fingerprint: String,
}

/// Content-addressable fetch service.
///
/// Implementations are blocking and must be shareable across threads so a
/// single engine can be driven from several callers.
pub trait Registry: Send + Sync {
    /// Make sure the snapshot of `origin` at `revision` is present under
    /// `cache_root` and return where it lives.
    fn resolve_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
    ) -> Result<Snapshot, RegistryError>;

    /// Materialize a working copy of `origin` at `revision` into
    /// `destination`, reusing the cached snapshot.
    fn materialize_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
        destination: &Path,
    ) -> Result<(), RegistryError>;

    /// Current fingerprint of `revision` without fetching content.
    fn latest_fingerprint(&self, origin: &OriginId, revision: &str)
    -> Result<String, RegistryError>;
}

impl<R: Registry + ?Sized> Registry for Box<R> {
    fn resolve_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
    ) -> Result<Snapshot, RegistryError> {
        (**self).resolve_snapshot(origin, revision, cache_root)
    }

    fn materialize_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
        destination: &Path,
    ) -> Result<(), RegistryError> {
        (**self).materialize_snapshot(origin, revision, cache_root, destination)
    }

    fn latest_fingerprint(&self, origin: &OriginId, revision: &str)
    -> Result<String, RegistryError> {
        (**self).latest_fingerprint(origin, revision)
    }
}

/// Registry serving snapshots from `<root>/<namespace>/<name>/<revision>/`.
///
/// A revision's fingerprint is the SHA-256 digest of its sorted file tree,
/// so editing a published revision in place changes its fingerprint.
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    root: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn revision_dir(&self, origin: &OriginId, revision: &str) -> Result<PathBuf, RegistryError> {
        let origin_dir = self.root.join(origin.namespace()).join(origin.name());
        if !origin_dir.is_dir() {
            return Err(RegistryError::UnknownOrigin {
                origin: origin.to_string(),
            });
        }
        let revision_dir = origin_dir.join(revision);
        if !revision_dir.is_dir() {
            return Err(RegistryError::UnknownRevision {
                origin: origin.to_string(),
                revision: revision.to_string(),
            });
        }
        Ok(revision_dir)
    }
}

impl Registry for DirectoryRegistry {
    fn resolve_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
    ) -> Result<Snapshot, RegistryError> {
        let source = self.revision_dir(origin, revision)?;
        let fingerprint = checksum::compute_tree_digest(&source)?;
        let path = cache::snapshot_path(cache_root, origin, &fingerprint);
        if path.is_dir() {
            tracing::debug!(origin = %origin, fingerprint = %fingerprint, "Snapshot already cached");
            return Ok(Snapshot { path, fingerprint });
        }

        let snapshots = path.parent().unwrap_or(cache_root);
        fs::create_dir_all(snapshots).map_err(|e| RegistryError::io(snapshots, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(snapshots)
            .map_err(|e| RegistryError::io(snapshots, e))?;
        io::copy_dir_all(&source, staging.path())?;

        let staged = staging.keep();
        if let Err(e) = fs::rename(&staged, &path) {
            let _ = fs::remove_dir_all(&staged);
            // Another writer may have published the same content first
            if !path.is_dir() {
                return Err(RegistryError::io(&path, e));
            }
        }

        tracing::debug!(origin = %origin, fingerprint = %fingerprint, "Cached snapshot");
        Ok(Snapshot { path, fingerprint })
    }

    fn materialize_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
        destination: &Path,
    ) -> Result<(), RegistryError> {
        let snapshot = self.resolve_snapshot(origin, revision, cache_root)?;
        io::copy_dir_all(&snapshot.path, destination)?;
        Ok(())
    }

    fn latest_fingerprint(
        &self,
        origin: &OriginId,
        revision: &str,
    ) -> Result<String, RegistryError> {
        let source = self.revision_dir(origin, revision)?;
        Ok(checksum::compute_tree_digest(&source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn publish(root: &Path, origin: &str, revision: &str, file: &str, content: &str) {
        let dir = root.join(origin).join(revision);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn resolve_snapshot_caches_by_fingerprint() {
        let registry_dir = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        publish(registry_dir.path(), "acme/widgets", "main", "widget.py", "x = 1\n");

        let registry = DirectoryRegistry::new(registry_dir.path());
        let origin = OriginId::parse("acme/widgets").unwrap();
        let snapshot = registry
            .resolve_snapshot(&origin, "main", cache.path())
            .unwrap();

        assert_eq!(
            snapshot.path,
            cache::snapshot_path(cache.path(), &origin, &snapshot.fingerprint)
        );
        assert_eq!(
            fs::read_to_string(snapshot.path.join("widget.py")).unwrap(),
            "x = 1\n"
        );
        assert_eq!(
            registry.latest_fingerprint(&origin, "main").unwrap(),
            snapshot.fingerprint
        );

        // Second resolution reuses the cached directory
        let again = registry
            .resolve_snapshot(&origin, "main", cache.path())
            .unwrap();
        assert_eq!(again, snapshot);
    }

    #[test]
    fn unknown_origin_and_revision_are_distinguished() {
        let registry_dir = TempDir::new().unwrap();
        publish(registry_dir.path(), "acme/widgets", "main", "a.py", "");
        let registry = DirectoryRegistry::new(registry_dir.path());

        let missing = OriginId::parse("acme/gadgets").unwrap();
        assert!(matches!(
            registry.latest_fingerprint(&missing, "main"),
            Err(RegistryError::UnknownOrigin { .. })
        ));

        let origin = OriginId::parse("acme/widgets").unwrap();
        assert!(matches!(
            registry.latest_fingerprint(&origin, "dev"),
            Err(RegistryError::UnknownRevision { .. })
        ));
    }

    #[test]
    fn materialize_copies_snapshot_to_destination() {
        let registry_dir = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        publish(registry_dir.path(), "acme/widgets", "main", "widget.py", "x = 1\n");

        let registry = DirectoryRegistry::new(registry_dir.path());
        let origin = OriginId::parse("acme/widgets").unwrap();
        let destination = work.path().join("acme/widgets");
        registry
            .materialize_snapshot(&origin, "main", cache.path(), &destination)
            .unwrap();

        assert_eq!(
            fs::read_to_string(destination.join("widget.py")).unwrap(),
            "x = 1\n"
        );
    }
}
