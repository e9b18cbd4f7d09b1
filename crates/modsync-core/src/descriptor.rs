//! Module identity and descriptor records
//!
//! A [`ModuleDescriptor`] is the resolved identity of one synchronized
//! dependency. Descriptors are immutable: a re-sync produces a new
//! descriptor that replaces the old one in the [`Manifest`](crate::Manifest).

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache;

/// Revision used when a dependency does not name one
pub const DEFAULT_REVISION: &str = "main";

/// Fingerprint written for modules that are not content-addressed
pub const NO_FINGERPRINT: &str = "NO_FINGERPRINT";

/// Stable identifier of a dependency's source, `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OriginId {
    namespace: String,
    name: String,
}

impl OriginId {
    /// Split `namespace/name` into its parts.
    ///
    /// Only the shape is checked here (exactly one `/`, both sides non-empty,
    /// no whitespace). Character-level rules live in the validator.
    pub fn parse(s: &str) -> Option<Self> {
        let (namespace, name) = s.split_once('/')?;
        if namespace.is_empty()
            || name.is_empty()
            || name.contains('/')
            || s.chars().any(char::is_whitespace)
        {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Opaque content address of a fetched snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Content-addressed snapshot identifier (a commit id or tree digest)
    Content(String),
    /// Local modules are linked, not fetched, and have no content address
    Unaddressed,
}

impl Fingerprint {
    /// Interpret a persisted fingerprint token.
    pub fn parse(token: &str) -> Self {
        if token == NO_FINGERPRINT {
            Self::Unaddressed
        } else {
            Self::Content(token.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Content(value) => value,
            Self::Unaddressed => NO_FINGERPRINT,
        }
    }

    pub fn is_content_addressed(&self) -> bool {
        matches!(self, Self::Content(_))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing `origin:revision` identifier.
///
/// Not globally unique: the same revision label can point at different
/// content over time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    origin: OriginId,
    revision: String,
}

impl ModuleId {
    pub fn new(origin: OriginId, revision: impl Into<String>) -> Self {
        Self {
            origin,
            revision: revision.into(),
        }
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.revision)
    }
}

/// Resolved identity and locations of one synchronized module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    origin: OriginId,
    revision: String,
    fingerprint: Fingerprint,
    cache_location: PathBuf,
    sync_location: PathBuf,
}

impl ModuleDescriptor {
    /// Descriptor for a module fetched from a registry.
    ///
    /// The cache location is derived from the cache layout so that a
    /// descriptor read back from the manifest compares equal.
    pub fn remote(
        origin: OriginId,
        revision: impl Into<String>,
        fingerprint: impl Into<String>,
        cache_root: &Path,
        sync_location: PathBuf,
    ) -> Self {
        let fingerprint = fingerprint.into();
        let cache_location = cache::snapshot_path(cache_root, &origin, &fingerprint);
        Self {
            origin,
            revision: revision.into(),
            fingerprint: Fingerprint::Content(fingerprint),
            cache_location,
            sync_location,
        }
    }

    /// Descriptor for a module linked from a local directory.
    ///
    /// `revision` is the absolute source path; the working copy is its own
    /// pristine copy, so the cache location is the sync location.
    pub fn local(origin: OriginId, revision: impl Into<String>, sync_location: PathBuf) -> Self {
        Self {
            origin,
            revision: revision.into(),
            fingerprint: Fingerprint::Unaddressed,
            cache_location: sync_location.clone(),
            sync_location,
        }
    }

    pub fn origin(&self) -> &OriginId {
        &self.origin
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn cache_location(&self) -> &Path {
        &self.cache_location
    }

    pub fn sync_location(&self) -> &Path {
        &self.sync_location
    }

    pub fn module_id(&self) -> ModuleId {
        ModuleId::new(self.origin.clone(), self.revision.clone())
    }

    pub fn is_local(&self) -> bool {
        !self.fingerprint.is_content_addressed()
    }

    /// The same module relocated under new sync and cache roots.
    ///
    /// `destination` is the sync location relative to the sync root.
    pub(crate) fn relocated(&self, sync_root: &Path, cache_root: &Path, destination: &str) -> Self {
        let sync_location = sync_root.join(destination);
        match &self.fingerprint {
            Fingerprint::Content(fp) => Self::remote(
                self.origin.clone(),
                self.revision.clone(),
                fp.clone(),
                cache_root,
                sync_location,
            ),
            Fingerprint::Unaddressed => {
                Self::local(self.origin.clone(), self.revision.clone(), sync_location)
            }
        }
    }
}
