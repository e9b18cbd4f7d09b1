//! Shared cache layout
//!
//! ```text
//! <cache_root>/
//!   modules--<namespace>--<name>/
//!     snapshots/<fingerprint>/...   pristine content, never edited
//! ```
//!
//! Registries store snapshots here and the manifest recomputes cache
//! locations from this layout instead of persisting them.

use std::path::{Path, PathBuf};

use crate::descriptor::OriginId;

const ORIGIN_DIR_PREFIX: &str = "modules";
const SNAPSHOTS_DIR: &str = "snapshots";

/// Directory holding everything cached for one origin.
pub fn origin_dir(cache_root: &Path, origin: &OriginId) -> PathBuf {
    cache_root.join(format!(
        "{}--{}--{}",
        ORIGIN_DIR_PREFIX,
        origin.namespace(),
        origin.name()
    ))
}

/// Location of the pristine snapshot of `origin` with `fingerprint`.
pub fn snapshot_path(cache_root: &Path, origin: &OriginId, fingerprint: &str) -> PathBuf {
    origin_dir(cache_root, origin)
        .join(SNAPSHOTS_DIR)
        .join(fingerprint)
}

/// Content-address segment of a snapshot path.
pub fn fingerprint_of(snapshot: &Path) -> Option<&str> {
    snapshot.file_name().and_then(|name| name.to_str())
}

/// Default cache root: `<user cache dir>/modsync/modules`.
///
/// Falls back to `.modsync-cache` in the working directory on platforms
/// without a user cache directory.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("modsync").join("modules"))
        .unwrap_or_else(|| PathBuf::from(".modsync-cache"))
}
