//! Content fetchers
//!
//! Both fetchers start by removing whatever occupies the sync location. The
//! removal and the re-creation are two separate steps: a crash in between
//! leaves the location absent, which the next sync repairs.

use std::fs;
use std::path::Path;

use modsync_fs::io;

use crate::cache;
use crate::descriptor::{ModuleDescriptor, OriginId};
use crate::registry::Registry;
use crate::{Error, Result};

/// Package marker placed in the sync root and in namespace directories.
pub const PACKAGE_MARKER: &str = "__init__.py";

/// Fetch `origin` at `revision` through the registry into `sync_location`.
///
/// The pristine snapshot lands in the shared cache first; the working copy
/// is then materialized from it.
pub fn fetch_remote(
    registry: &dyn Registry,
    origin: &OriginId,
    revision: &str,
    sync_location: &Path,
    cache_root: &Path,
) -> Result<ModuleDescriptor> {
    clear_sync_location(origin, sync_location)?;
    prepare_parent(origin, sync_location)?;

    let snapshot = registry
        .resolve_snapshot(origin, revision, cache_root)
        .map_err(|e| Error::fetch(origin, e))?;

    let fingerprint = cache::fingerprint_of(&snapshot.path)
        .filter(|segment| *segment == snapshot.fingerprint)
        .ok_or_else(|| Error::FetchFailed {
            origin: origin.to_string(),
            reason: format!(
                "registry returned snapshot {} that is not addressed by fingerprint {}",
                snapshot.path.display(),
                snapshot.fingerprint
            ),
        })?
        .to_string();

    registry
        .materialize_snapshot(origin, revision, cache_root, sync_location)
        .map_err(|e| Error::fetch(origin, e))?;

    tracing::debug!(
        origin = %origin,
        revision = %revision,
        fingerprint = %fingerprint,
        path = %sync_location.display(),
        "Materialized working copy"
    );

    Ok(ModuleDescriptor::remote(
        origin.clone(),
        revision,
        fingerprint,
        cache_root,
        sync_location.to_path_buf(),
    ))
}

/// Link `sync_location` to the local directory `source`.
///
/// Nothing is copied: edits under `source` are visible immediately.
pub fn fetch_local(origin: &OriginId, source: &Path, sync_location: &Path) -> Result<ModuleDescriptor> {
    clear_sync_location(origin, sync_location)?;
    prepare_parent(origin, sync_location)?;

    io::symlink_dir(source, sync_location).map_err(|e| fetch_failed(origin, e))?;

    tracing::debug!(
        origin = %origin,
        source = %source.display(),
        path = %sync_location.display(),
        "Linked local module"
    );

    Ok(ModuleDescriptor::local(
        origin.clone(),
        source.display().to_string(),
        sync_location.to_path_buf(),
    ))
}

fn clear_sync_location(origin: &OriginId, sync_location: &Path) -> Result<()> {
    if io::remove_dir_or_link(sync_location).map_err(|e| fetch_failed(origin, e))? {
        tracing::debug!(origin = %origin, path = %sync_location.display(), "Removed previous working copy");
    }
    Ok(())
}

/// Create the parent of `sync_location` and mark it as a package.
fn prepare_parent(origin: &OriginId, sync_location: &Path) -> Result<()> {
    if let Some(parent) = sync_location.parent() {
        fs::create_dir_all(parent).map_err(|e| fetch_failed(origin, modsync_fs::Error::io(parent, e)))?;
        io::touch(&parent.join(PACKAGE_MARKER)).map_err(|e| fetch_failed(origin, e))?;
    }
    Ok(())
}

fn fetch_failed(origin: &OriginId, err: modsync_fs::Error) -> Error {
    Error::FetchFailed {
        origin: origin.to_string(),
        reason: err.to_string(),
    }
}
