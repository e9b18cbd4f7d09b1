//! Manifest codec
//!
//! The manifest is the persisted record of the last successful
//! synchronization and the only durable state the engine owns:
//!
//! ```text
//! ##########################################
//! # auto-generated by modsync, DO NOT EDIT #
//! ##########################################
//! sync_root: /work/synced_modules
//! cache_root: /home/me/.cache/modsync/modules
//! acme/widgets main 3f2a... -> _/acme/widgets
//! 3rdparty/tools main 9c1b... -> _/user_3rdparty/tools
//! ```
//!
//! Cache locations are not stored; for remote modules they are recomputed
//! from the cache layout, for local modules they equal the sync location.

use std::fmt;
use std::path::{Path, PathBuf};

use modsync_fs::{NormalizedPath, io};

use crate::descriptor::{Fingerprint, ModuleDescriptor, OriginId};
use crate::{Error, Result};

/// Header written at the top of every manifest and matched line-for-line on read.
pub const MANIFEST_HEADER: &str = "\
##########################################
# auto-generated by modsync, DO NOT EDIT #
##########################################";

const SYNC_ROOT_KEY: &str = "sync_root: ";
const CACHE_ROOT_KEY: &str = "cache_root: ";
const ENTRY_ARROW: &str = " -> _/";

/// What went wrong on a manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A header line differs from the fixed header
    HeaderMismatch { expected: String },
    /// Line after the header is not `sync_root: <value>`
    MissingSyncRoot,
    /// Line after `sync_root:` is not `cache_root: <value>`
    MissingCacheRoot,
    /// Entry line does not match `<ns>/<name> <rev> <fingerprint> -> _/<path>`
    MalformedEntry,
    /// Second entry for an origin id already seen
    DuplicateOrigin { origin: String },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderMismatch { expected } => {
                write!(f, "header is corrupted, expected `{expected}`")
            }
            Self::MissingSyncRoot => f.write_str("expected `sync_root: <path>`"),
            Self::MissingCacheRoot => f.write_str("expected `cache_root: <path>`"),
            Self::MalformedEntry => f.write_str(
                "expected `<namespace>/<name> <revision> <fingerprint> -> _/<relative path>`",
            ),
            Self::DuplicateOrigin { origin } => {
                write!(f, "origin '{origin}' appears more than once")
            }
        }
    }
}

/// Structured manifest parse failure with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {kind}")]
pub struct ManifestParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ManifestParseError {
    fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }

    /// Attach the manifest path to produce the crate-level error.
    pub fn at(self, path: &Path) -> Error {
        Error::ManifestCorrupt {
            path: path.to_path_buf(),
            line: self.line,
            reason: self.kind.to_string(),
        }
    }
}

/// Persisted summary of the last synchronization.
///
/// Holds at most one descriptor per origin id, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    sync_root: PathBuf,
    cache_root: PathBuf,
    modules: Vec<ModuleDescriptor>,
}

impl Manifest {
    /// Create an empty manifest for the given roots.
    pub fn new(sync_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            sync_root: sync_root.into(),
            cache_root: cache_root.into(),
            modules: Vec::new(),
        }
    }

    pub fn sync_root(&self) -> &Path {
        &self.sync_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// All descriptors in insertion order.
    pub fn modules(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Look up the descriptor for `origin`.
    pub fn get(&self, origin: &OriginId) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|m| m.origin() == origin)
    }

    /// Insert a descriptor, replacing any descriptor with the same origin id
    /// in place. Returns the replaced descriptor.
    pub fn insert(&mut self, descriptor: ModuleDescriptor) -> Option<ModuleDescriptor> {
        match self
            .modules
            .iter_mut()
            .find(|m| m.origin() == descriptor.origin())
        {
            Some(slot) => Some(std::mem::replace(slot, descriptor)),
            None => {
                self.modules.push(descriptor);
                None
            }
        }
    }

    /// Move every descriptor under new roots.
    ///
    /// Relative sync paths are preserved; remote cache locations are
    /// recomputed under `cache_root`. Returns `false` if the roots already
    /// matched and nothing changed.
    pub fn rebase(&mut self, sync_root: &Path, cache_root: &Path) -> bool {
        if self.sync_root == sync_root && self.cache_root == cache_root {
            return false;
        }
        let modules = self
            .modules
            .iter()
            .map(|m| m.relocated(sync_root, cache_root, &self.relative_sync_path(m)))
            .collect();
        self.modules = modules;
        self.sync_root = sync_root.to_path_buf();
        self.cache_root = cache_root.to_path_buf();
        true
    }

    fn relative_sync_path(&self, module: &ModuleDescriptor) -> String {
        let location = NormalizedPath::new(module.sync_location());
        location
            .relative_to(&NormalizedPath::new(&self.sync_root))
            .unwrap_or(location)
            .as_str()
            .to_string()
    }

    /// Render the full manifest text, header included.
    pub fn serialize(&self) -> String {
        let mut lines = vec![
            MANIFEST_HEADER.to_string(),
            format!("{}{}", SYNC_ROOT_KEY, NormalizedPath::new(&self.sync_root)),
            format!("{}{}", CACHE_ROOT_KEY, NormalizedPath::new(&self.cache_root)),
        ];
        for module in &self.modules {
            lines.push(format!(
                "{} {} {}{}{}",
                module.origin(),
                module.revision(),
                module.fingerprint(),
                ENTRY_ARROW,
                self.relative_sync_path(module)
            ));
        }
        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Parse manifest text.
    pub fn parse(text: &str) -> std::result::Result<Self, ManifestParseError> {
        let mut lines = text.lines().enumerate().map(|(idx, line)| (idx + 1, line.trim()));

        let mut next_line = 0;
        for expected in MANIFEST_HEADER.lines() {
            next_line += 1;
            match lines.next() {
                Some((_, line)) if line == expected.trim() => {}
                _ => {
                    return Err(ManifestParseError::new(
                        next_line,
                        ParseErrorKind::HeaderMismatch {
                            expected: expected.to_string(),
                        },
                    ));
                }
            }
        }

        next_line += 1;
        let sync_root = lines
            .next()
            .and_then(|(_, line)| keyed_value(line, SYNC_ROOT_KEY))
            .ok_or_else(|| ManifestParseError::new(next_line, ParseErrorKind::MissingSyncRoot))?;

        next_line += 1;
        let cache_root = lines
            .next()
            .and_then(|(_, line)| keyed_value(line, CACHE_ROOT_KEY))
            .ok_or_else(|| ManifestParseError::new(next_line, ParseErrorKind::MissingCacheRoot))?;

        let mut manifest = Manifest::new(sync_root, cache_root);
        for (number, line) in lines {
            if line.is_empty() {
                continue;
            }
            let descriptor = parse_entry(line, &manifest.sync_root, &manifest.cache_root)
                .ok_or_else(|| ManifestParseError::new(number, ParseErrorKind::MalformedEntry))?;
            if manifest.get(descriptor.origin()).is_some() {
                return Err(ManifestParseError::new(
                    number,
                    ParseErrorKind::DuplicateOrigin {
                        origin: descriptor.origin().to_string(),
                    },
                ));
            }
            manifest.modules.push(descriptor);
        }

        Ok(manifest)
    }

    /// Read a manifest from disk.
    ///
    /// A missing file is not an error and yields `None`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let normalized = NormalizedPath::new(path);
        if !normalized.exists() {
            return Ok(None);
        }
        let text = io::read_text(&normalized)?;
        Self::parse(&text).map(Some).map_err(|e| e.at(path))
    }

    /// Write the manifest to disk atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        io::write_text(&NormalizedPath::new(path), &self.serialize())?;
        Ok(())
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

fn keyed_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let value = line.strip_prefix(key)?.trim();
    (!value.is_empty()).then_some(value)
}

/// `<ns>/<name> <revision> <fingerprint> -> _/<relative path>`
///
/// The revision is everything between the first and the last space of the
/// left-hand side, so local paths containing spaces survive.
fn parse_entry(line: &str, sync_root: &Path, cache_root: &Path) -> Option<ModuleDescriptor> {
    let (left, relative) = line.split_once(ENTRY_ARROW)?;
    let relative = relative.trim();
    if relative.is_empty() {
        return None;
    }

    let (origin, rest) = left.trim().split_once(' ')?;
    let (revision, fingerprint) = rest.trim().rsplit_once(' ')?;
    let revision = revision.trim();
    let fingerprint = fingerprint.trim();
    if revision.is_empty() || fingerprint.is_empty() {
        return None;
    }

    let origin = OriginId::parse(origin)?;
    let sync_location = sync_root.join(relative);
    Some(match Fingerprint::parse(fingerprint) {
        Fingerprint::Content(fp) => {
            ModuleDescriptor::remote(origin, revision, fp, cache_root, sync_location)
        }
        Fingerprint::Unaddressed => ModuleDescriptor::local(origin, revision, sync_location),
    })
}
