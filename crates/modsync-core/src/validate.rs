//! Dependency descriptor validation
//!
//! Turns a raw [`DependencyRequest`] into a [`ValidatedDependency`]: a checked
//! origin id, an import-safe destination name and a revision classified as
//! remote or local.
//!
//! Classification uses filesystem existence: a revision string naming an
//! existing path is local, anything else is a remote label. The check is
//! inherently racy since the path can appear or vanish before it is used.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::descriptor::{DEFAULT_REVISION, ModuleId, OriginId};
use crate::{Error, Result};

/// Prefix that makes a digit-leading namespace import-safe.
pub const NAMESPACE_PREFIX: &str = "user_";

static ORIGIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)/(\w+)$").unwrap());
static DESTINATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*(/[A-Za-z_]\w*)*$").unwrap());

/// Raw dependency input, as written by a caller or a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyRequest {
    pub origin: String,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
}

impl DependencyRequest {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Where a dependency's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// A label resolved by the registry
    Remote(String),
    /// An absolute path to a local directory
    Local(PathBuf),
}

impl Revision {
    /// The revision as recorded in the manifest.
    pub fn label(&self) -> String {
        match self {
            Self::Remote(label) => label.clone(),
            Self::Local(path) => path.display().to_string(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// A dependency in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedDependency {
    pub origin: OriginId,
    pub revision: Revision,
    /// Destination name relative to the sync root, `/`-separated
    pub destination: String,
    pub overwrite: bool,
}

impl ValidatedDependency {
    pub fn module_id(&self) -> ModuleId {
        ModuleId::new(self.origin.clone(), self.revision.label())
    }

    /// `<sync_root>/<destination>`
    pub fn sync_location(&self, sync_root: &Path) -> PathBuf {
        self.destination
            .split('/')
            .fold(sync_root.to_path_buf(), |path, segment| path.join(segment))
    }
}

/// Validate `request` against the rules for origin ids, destination names
/// and revisions. `sync_root` is the managed tree local revisions must stay
/// out of; `caller` labels diagnostics.
pub fn validate(
    request: &DependencyRequest,
    sync_root: &Path,
    caller: &str,
) -> Result<ValidatedDependency> {
    let invalid = |reason: String| Error::InvalidDependency {
        origin: request.origin.clone(),
        reason,
    };

    let captures = ORIGIN_RE
        .captures(&request.origin)
        .ok_or_else(|| invalid("origin must have the form '<namespace>/<name>'".to_string()))?;
    let namespace = &captures[1];
    let name = &captures[2];

    if starts_with_digit(name) {
        return Err(invalid(format!(
            "'{name}' is not a legal module name: it starts with a digit"
        )));
    }

    let origin = OriginId::parse(&request.origin)
        .ok_or_else(|| invalid("origin must have the form '<namespace>/<name>'".to_string()))?;

    let destination = match &request.destination {
        Some(destination) => {
            if !DESTINATION_RE.is_match(destination) {
                return Err(invalid(format!(
                    "destination '{destination}' must be '/'-separated identifiers not starting with a digit"
                )));
            }
            destination.clone()
        }
        None if starts_with_digit(namespace) => {
            let rewritten = format!("{NAMESPACE_PREFIX}{namespace}");
            tracing::warn!(
                origin = %origin,
                caller = %caller,
                namespace = %rewritten,
                "Namespace starts with a digit, syncing under a prefixed name"
            );
            format!("{rewritten}/{name}")
        }
        None => format!("{namespace}/{name}"),
    };

    let revision = classify_revision(
        request.revision.as_deref().unwrap_or(DEFAULT_REVISION),
        &origin,
        sync_root,
    )?;

    Ok(ValidatedDependency {
        origin,
        revision,
        destination,
        overwrite: request.overwrite,
    })
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn classify_revision(revision: &str, origin: &OriginId, sync_root: &Path) -> Result<Revision> {
    if revision.is_empty() {
        return Err(Error::InvalidDependency {
            origin: origin.to_string(),
            reason: "revision must not be empty".to_string(),
        });
    }

    let candidate = Path::new(revision);
    if candidate.exists() {
        if !candidate.is_dir() {
            return Err(Error::InvalidLocalRevision {
                origin: origin.to_string(),
                path: candidate.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        let absolute = dunce::canonicalize(candidate)?;
        let managed = dunce::canonicalize(sync_root).unwrap_or_else(|_| sync_root.to_path_buf());
        if absolute.starts_with(&managed) {
            return Err(Error::InvalidLocalRevision {
                origin: origin.to_string(),
                path: absolute,
                reason: format!("it lies inside the synced tree {}", managed.display()),
            });
        }
        return Ok(Revision::Local(absolute));
    }

    if let Some(illegal) = revision.chars().find(|&c| !(c.is_alphanumeric() || c == '_')) {
        return Err(Error::InvalidRevision {
            origin: origin.to_string(),
            revision: revision.to_string(),
            illegal,
        });
    }
    Ok(Revision::Remote(revision.to_string()))
}
