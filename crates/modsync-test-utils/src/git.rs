//! Git origin fixtures built with `git2`.
//!
//! Repositories are laid out the way a git-backed registry expects them:
//! `<base>/<namespace>/<name>`, each with a `main` branch.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository, RepositoryInitOptions, Signature};

/// A non-bare origin repository that tests commit into.
pub struct OriginRepo {
    repo: Repository,
    path: PathBuf,
}

impl OriginRepo {
    /// Initialise `<base>/<origin>` with `main` as its initial branch and
    /// commit `files` to it.
    ///
    /// # Panics
    /// Panics if any git or filesystem operation fails.
    pub fn create(base: &Path, origin: &str, files: &[(&str, &str)]) -> Self {
        let path = base.join(origin);
        fs::create_dir_all(&path)
            .unwrap_or_else(|e| panic!("OriginRepo: failed to create {}: {e}", path.display()));

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(&path, &opts).unwrap_or_else(|e| {
            panic!("OriginRepo: failed to init {}: {e}", path.display())
        });

        let origin_repo = Self { repo, path };
        origin_repo.commit(files, "Initial commit");
        origin_repo
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `files` (relative path, content) and commit them on the current
    /// branch. Returns the new commit id as hex.
    ///
    /// # Panics
    /// Panics if any git or filesystem operation fails.
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> String {
        for (relative, content) in files {
            let file = self.path.join(relative);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&file, content)
                .unwrap_or_else(|e| panic!("OriginRepo: failed to write {}: {e}", file.display()));
        }

        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let sig = Signature::now("Test User", "test@test.com").unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap_or_else(|e| panic!("OriginRepo: commit failed: {e}"));
        oid.to_string()
    }

    /// Create branch `name` at the current `HEAD` commit.
    pub fn branch(&self, name: &str) -> String {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo.branch(name, &head, true).unwrap();
        head.id().to_string()
    }

    /// Commit id `HEAD` points at.
    pub fn head(&self) -> String {
        let oid: Oid = self.repo.head().unwrap().target().unwrap();
        oid.to_string()
    }
}
