//! [`TestWorkspace`] for synchronization scenarios.
//!
//! One temporary directory holding:
//!
//! ```text
//! registry/<namespace>/<name>/<revision>/...   published revisions
//! cache/                                       shared cache root
//! project/synced_modules/                      sync root
//! local/                                       local module sources
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Temporary workspace with a directory registry, cache and sync root.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        for dir in ["registry", "cache", "project", "local"] {
            fs::create_dir_all(temp_dir.path().join(dir)).unwrap();
        }
        Self { temp_dir }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn registry_root(&self) -> PathBuf {
        self.root().join("registry")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.root().join("cache")
    }

    pub fn project_dir(&self) -> PathBuf {
        self.root().join("project")
    }

    pub fn sync_root(&self) -> PathBuf {
        self.project_dir().join("synced_modules")
    }

    /// Publish `files` as `origin` at `revision`, replacing whatever was
    /// published there before.
    pub fn publish(&self, origin: &str, revision: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.registry_root().join(origin).join(revision);
        if dir.exists() {
            fs::remove_dir_all(&dir).unwrap();
        }
        write_files(&dir, files);
        dir
    }

    /// Create a local module source directory under `local/<name>`.
    pub fn local_module(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.root().join("local").join(name);
        write_files(&dir, files);
        dir
    }

    /// Path of a file inside the working copy of `destination`.
    pub fn synced_file(&self, destination: &str, relative: &str) -> PathBuf {
        self.sync_root().join(destination).join(relative)
    }

    /// Read a file inside the working copy of `destination`.
    pub fn read_synced(&self, destination: &str, relative: &str) -> String {
        let path = self.synced_file(destination, relative);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
    }

    /// Overwrite a file inside the working copy of `destination`.
    pub fn edit_synced(&self, destination: &str, relative: &str, content: &str) {
        fs::write(self.synced_file(destination, relative), content).unwrap();
    }

    /// Write a `modsync.toml` into the project directory.
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.project_dir().join("modsync.toml");
        fs::write(&path, content).unwrap();
        path
    }

    /// Contents of the manifest file, if written.
    pub fn manifest_text(&self) -> Option<String> {
        fs::read_to_string(self.sync_root().join("modules.mod")).ok()
    }
}

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    for (relative, content) in files {
        let file = dir.join(relative);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file, content).unwrap();
    }
}
