//! [`GitRegistry`] implementation

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Direction, ObjectType, Oid, Remote, Repository, TreeWalkMode, TreeWalkResult};
use modsync_core::cache;
use modsync_core::{OriginId, Registry, RegistryError, Snapshot};
use modsync_fs::io;

use crate::{Error, Result};

const MIRROR_DIR: &str = "mirror.git";
const FETCH_REFSPECS: [&str; 2] = ["+refs/heads/*:refs/heads/*", "+refs/tags/*:refs/tags/*"];

const MODE_EXECUTABLE: i32 = 0o100755;
const MODE_LINK: i32 = 0o120000;

/// Registry serving modules from git repositories.
#[derive(Debug, Clone)]
pub struct GitRegistry {
    base: String,
    cache_root: Option<PathBuf>,
}

impl GitRegistry {
    /// `base` is a URL (`https://host/group`) or a local directory.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            cache_root: None,
        }
    }

    /// Shared cache whose mirrors answer fingerprint lookups for
    /// abbreviated commit ids. Without one, such lookups fetch into a
    /// scratch mirror every time.
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(cache_root.into());
        self
    }

    /// Repository location of `origin`.
    pub fn origin_url(&self, origin: &OriginId) -> String {
        if self.base.contains("://") {
            format!("{}/{}/{}", self.base, origin.namespace(), origin.name())
        } else {
            Path::new(&self.base)
                .join(origin.namespace())
                .join(origin.name())
                .display()
                .to_string()
        }
    }

    fn check_origin(&self, origin: &OriginId, url: &str) -> Result<()> {
        if !self.base.contains("://") && !Path::new(url).exists() {
            return Err(Error::OriginNotFound {
                origin: origin.to_string(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Open the bare mirror of `origin`, creating it if needed, and fetch
    /// all branches and tags into it.
    fn update_mirror(&self, origin: &OriginId, cache_root: &Path) -> Result<Repository> {
        let url = self.origin_url(origin);
        self.check_origin(origin, &url)?;

        let path = cache::origin_dir(cache_root, origin).join(MIRROR_DIR);
        let repo = match Repository::open_bare(&path) {
            Ok(repo) => repo,
            Err(_) => {
                fs::create_dir_all(&path).map_err(|e| modsync_fs::Error::io(&path, e))?;
                Repository::init_bare(&path)?
            }
        };

        tracing::debug!(origin = %origin, url = %url, "Fetching into mirror");
        {
            let mut remote = repo.remote_anonymous(&url)?;
            remote.fetch(&FETCH_REFSPECS, None, None)?;
        }
        Ok(repo)
    }

    fn snapshot(&self, origin: &OriginId, revision: &str, cache_root: &Path) -> Result<Snapshot> {
        let repo = self.update_mirror(origin, cache_root)?;
        let commit_id = resolve_commit(&repo, origin, revision)?;
        let fingerprint = commit_id.to_string();
        let path = cache::snapshot_path(cache_root, origin, &fingerprint);

        if !path.is_dir() {
            let snapshots = path.parent().unwrap_or(cache_root);
            fs::create_dir_all(snapshots).map_err(|e| modsync_fs::Error::io(snapshots, e))?;
            let staging = tempfile::Builder::new()
                .prefix(".staging-")
                .tempdir_in(snapshots)
                .map_err(|e| modsync_fs::Error::io(snapshots, e))?;

            let tree = repo.find_commit(commit_id)?.tree()?;
            checkout_tree(&repo, &tree, staging.path())?;

            let staged = staging.keep();
            if let Err(e) = fs::rename(&staged, &path) {
                let _ = fs::remove_dir_all(&staged);
                if !path.is_dir() {
                    return Err(modsync_fs::Error::io(&path, e).into());
                }
            }
            tracing::debug!(origin = %origin, revision = %revision, commit = %fingerprint, "Cached snapshot");
        }

        Ok(Snapshot { path, fingerprint })
    }

    fn remote_fingerprint(&self, origin: &OriginId, revision: &str) -> Result<String> {
        let url = self.origin_url(origin);
        self.check_origin(origin, &url)?;

        let mut remote = Remote::create_detached(url.as_str())?;
        remote.connect(Direction::Fetch)?;

        let candidates = [
            format!("refs/heads/{revision}"),
            format!("refs/tags/{revision}^{{}}"),
            format!("refs/tags/{revision}"),
        ];
        let heads = remote.list()?;
        let found = candidates.iter().find_map(|name| {
            heads
                .iter()
                .find(|head| head.name() == name.as_str())
                .map(|head| head.oid().to_string())
        });
        remote.disconnect()?;

        match found {
            Some(oid) => Ok(oid),
            // A full commit id names itself
            None if is_commit_id(revision) && revision.len() == 40 => Ok(revision.to_lowercase()),
            None if is_commit_id(revision) => self.expand_commit_id(origin, revision),
            None => Err(Error::RevisionNotFound {
                origin: origin.to_string(),
                revision: revision.to_string(),
            }),
        }
    }

    /// Full id of the commit abbreviated as `revision`, looked up in the
    /// origin's mirror. The mirror is only fetched when it lacks the commit.
    fn expand_commit_id(&self, origin: &OriginId, revision: &str) -> Result<String> {
        let scratch;
        let cache_root = match &self.cache_root {
            Some(cache_root) => cache_root.as_path(),
            None => {
                scratch = tempfile::tempdir().map_err(|e| modsync_fs::Error::io(std::env::temp_dir(), e))?;
                scratch.path()
            }
        };

        let mirror = cache::origin_dir(cache_root, origin).join(MIRROR_DIR);
        if let Ok(repo) = Repository::open_bare(&mirror)
            && let Ok(commit_id) = resolve_commit(&repo, origin, revision)
        {
            return Ok(commit_id.to_string());
        }

        let repo = self.update_mirror(origin, cache_root)?;
        let commit_id = resolve_commit(&repo, origin, revision)?;
        tracing::debug!(origin = %origin, revision = %revision, commit = %commit_id, "Expanded abbreviated commit id");
        Ok(commit_id.to_string())
    }
}

/// Hex strings git accepts as (possibly abbreviated) commit ids.
fn is_commit_id(revision: &str) -> bool {
    (4..=40).contains(&revision.len()) && revision.bytes().all(|b| b.is_ascii_hexdigit())
}

fn resolve_commit(repo: &Repository, origin: &OriginId, revision: &str) -> Result<Oid> {
    let not_found = || Error::RevisionNotFound {
        origin: origin.to_string(),
        revision: revision.to_string(),
    };
    let object = [
        format!("refs/heads/{revision}"),
        format!("refs/tags/{revision}"),
        revision.to_string(),
    ]
    .iter()
    .find_map(|spec| repo.revparse_single(spec).ok())
    .ok_or_else(not_found)?;
    let commit = object.peel_to_commit().map_err(|_| not_found())?;
    Ok(commit.id())
}

/// Write every blob of `tree` below `destination`.
fn checkout_tree(repo: &Repository, tree: &git2::Tree<'_>, destination: &Path) -> Result<()> {
    let mut failure: Option<Error> = None;

    let walked = tree.walk(TreeWalkMode::PreOrder, |parent, entry| {
        let Some(name) = entry.name() else {
            return TreeWalkResult::Skip;
        };
        let path = destination.join(parent).join(name);
        let result = match entry.kind() {
            Some(ObjectType::Tree) => fs::create_dir_all(&path).map_err(|source| Error::Checkout {
                path: path.clone(),
                source,
            }),
            Some(ObjectType::Blob) => repo
                .find_blob(entry.id())
                .map_err(Error::from)
                .and_then(|blob| write_blob(&path, blob.content(), entry.filemode())),
            // Submodule commits have no content in this repository
            _ => Ok(()),
        };
        match result {
            Ok(()) => TreeWalkResult::Ok,
            Err(e) => {
                failure = Some(e);
                TreeWalkResult::Abort
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(walked?),
    }
}

fn write_blob(path: &Path, content: &[u8], mode: i32) -> Result<()> {
    let result = if mode == MODE_LINK {
        write_link(path, content)
    } else {
        fs::write(path, content).and_then(|()| {
            if mode == MODE_EXECUTABLE {
                make_executable(path)
            } else {
                Ok(())
            }
        })
    };
    result.map_err(|source| Error::Checkout {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(unix)]
fn write_link(path: &Path, target: &[u8]) -> std::io::Result<()> {
    let target = PathBuf::from(String::from_utf8_lossy(target).into_owned());
    std::os::unix::fs::symlink(target, path)
}

// Without unix symlinks the link target is checked out as file content, like git does
#[cfg(not(unix))]
fn write_link(path: &Path, target: &[u8]) -> std::io::Result<()> {
    fs::write(path, target)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl Registry for GitRegistry {
    fn resolve_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
    ) -> std::result::Result<Snapshot, RegistryError> {
        Ok(self.snapshot(origin, revision, cache_root)?)
    }

    fn materialize_snapshot(
        &self,
        origin: &OriginId,
        revision: &str,
        cache_root: &Path,
        destination: &Path,
    ) -> std::result::Result<(), RegistryError> {
        let snapshot = self.snapshot(origin, revision, cache_root)?;
        io::copy_dir_all(&snapshot.path, destination)?;
        Ok(())
    }

    fn latest_fingerprint(
        &self,
        origin: &OriginId,
        revision: &str,
    ) -> std::result::Result<String, RegistryError> {
        Ok(self.remote_fingerprint(origin, revision)?)
    }
}
