//! Synchronization driver
//!
//! [`SyncEngine`] owns the sync root, the manifest in it, and the injected
//! collaborators (registry, confirmation, post-sync hook). One call to
//! [`SyncEngine::sync`] runs every dependency through validation and
//! reconciliation in request order and writes the manifest back.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use modsync_fs::{NormalizedPath, io};
use serde::Serialize;

use crate::cache;
use crate::config::SYNC_FOLDER;
use crate::confirm::{AutoConfirm, Confirm};
use crate::descriptor::ModuleDescriptor;
use crate::detect;
use crate::fetch::PACKAGE_MARKER;
use crate::manifest::Manifest;
use crate::reconcile::{Reason, Reconciler};
use crate::registry::Registry;
use crate::requirements::PostSyncHook;
use crate::validate::{DependencyRequest, validate};
use crate::{Error, Result};

/// Manifest file name inside the sync root.
pub const MANIFEST_FILE: &str = "modules.mod";

/// Ignore file kept in the sync root.
pub const IGNORE_FILE: &str = ".gitignore";

const IGNORE_COMMENT: &str = "# synced modules are managed by modsync";
const IGNORE_RULE: &str = "*";

/// Serializes whole sync calls.
///
/// Engines sharing a lock never run concurrently; engines with separate
/// locks do. Clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct SyncLock(Arc<Mutex<()>>);

impl SyncLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        // The guarded state lives on disk, a panicked holder leaves nothing to repair
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Per-dependency result of a sync call.
#[derive(Debug, Clone, Serialize)]
pub struct SyncEntry {
    pub origin: String,
    pub module: String,
    pub fingerprint: String,
    pub sync_location: PathBuf,
    pub fetched: bool,
    pub reason: String,
    #[serde(skip)]
    pub decision: Reason,
}

impl SyncEntry {
    fn new(descriptor: &ModuleDescriptor, reason: Reason) -> Self {
        Self {
            origin: descriptor.origin().to_string(),
            module: descriptor.module_id().to_string(),
            fingerprint: descriptor.fingerprint().to_string(),
            sync_location: descriptor.sync_location().to_path_buf(),
            fetched: reason.action() == crate::reconcile::Action::Fetch,
            reason: reason.to_string(),
            decision: reason,
        }
    }
}

/// Everything a sync call produced.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub manifest: Manifest,
    /// One entry per request, in request order
    pub entries: Vec<SyncEntry>,
}

impl SyncReport {
    pub fn fetched(&self) -> usize {
        self.entries.iter().filter(|e| e.fetched).count()
    }
}

/// State of a synced module's working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Matches its pristine snapshot
    Clean,
    /// Differs from its pristine snapshot
    Modified,
    /// Linked to a local directory
    Linked,
    /// Recorded in the manifest but absent on disk
    Missing,
}

/// One row of [`SyncEngine::status`].
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatus {
    pub origin: String,
    pub module: String,
    pub fingerprint: String,
    pub sync_location: PathBuf,
    pub state: ModuleState,
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    registry: Box<dyn Registry>,
    sync_root: Option<PathBuf>,
    cache_root: Option<PathBuf>,
    confirm: Box<dyn Confirm>,
    hook: Option<Box<dyn PostSyncHook>>,
    lock: SyncLock,
}

impl SyncEngineBuilder {
    /// Sync root; defaults to `./synced_modules`.
    pub fn sync_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sync_root = Some(root.into());
        self
    }

    /// Shared cache root; defaults to the user cache directory.
    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Confirmation port; defaults to answering "no" to every prompt.
    pub fn confirm(mut self, confirm: impl Confirm + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    pub fn post_sync_hook(mut self, hook: impl PostSyncHook + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Lock to serialize against; engines get a private lock by default.
    pub fn lock(mut self, lock: SyncLock) -> Self {
        self.lock = lock;
        self
    }

    /// Build the engine. Relative roots are made absolute against the
    /// current directory.
    pub fn build(self) -> Result<SyncEngine> {
        let sync_root = match self.sync_root {
            Some(root) => root,
            None => PathBuf::from(SYNC_FOLDER),
        };
        let cache_root = self.cache_root.unwrap_or_else(cache::default_cache_root);
        Ok(SyncEngine {
            sync_root: std::path::absolute(&sync_root)?,
            cache_root: std::path::absolute(&cache_root)?,
            registry: self.registry,
            confirm: self.confirm,
            hook: self.hook,
            lock: self.lock,
        })
    }
}

/// Drives synchronization of a flat dependency list into one sync root.
pub struct SyncEngine {
    sync_root: PathBuf,
    cache_root: PathBuf,
    registry: Box<dyn Registry>,
    confirm: Box<dyn Confirm>,
    hook: Option<Box<dyn PostSyncHook>>,
    lock: SyncLock,
}

impl SyncEngine {
    pub fn builder(registry: impl Registry + 'static) -> SyncEngineBuilder {
        SyncEngineBuilder {
            registry: Box::new(registry),
            sync_root: None,
            cache_root: None,
            confirm: Box::new(AutoConfirm(false)),
            hook: None,
            lock: SyncLock::new(),
        }
    }

    /// Engine rooted at `./synced_modules` with the default cache root.
    pub fn for_current_dir(registry: impl Registry + 'static) -> Result<Self> {
        Self::builder(registry)
            .sync_root(std::env::current_dir()?.join(SYNC_FOLDER))
            .build()
    }

    pub fn sync_root(&self) -> &Path {
        &self.sync_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.sync_root.join(MANIFEST_FILE)
    }

    /// Synchronize `requests` and return the updated manifest.
    pub fn sync(&self, requests: &[DependencyRequest], overwrite: bool, caller: &str) -> Result<Manifest> {
        self.sync_report(requests, overwrite, caller)
            .map(|report| report.manifest)
    }

    /// Synchronize `requests` and return the sync location of each, in
    /// request order.
    pub fn sync_paths(&self, requests: &[DependencyRequest], overwrite: bool) -> Result<Vec<PathBuf>> {
        let report = self.sync_report(requests, overwrite, "modsync")?;
        Ok(report.entries.into_iter().map(|e| e.sync_location).collect())
    }

    /// Synchronize `requests`, reporting what happened to each.
    ///
    /// Stops at the first failing dependency. Dependencies processed before
    /// it stay synced and the manifest is written up to that point.
    pub fn sync_report(
        &self,
        requests: &[DependencyRequest],
        overwrite: bool,
        caller: &str,
    ) -> Result<SyncReport> {
        let _guard = self.lock.acquire();
        tracing::info!(
            caller = %caller,
            count = requests.len(),
            root = %self.sync_root.display(),
            "Synchronizing modules"
        );

        self.prepare_root()?;
        let manifest_path = self.manifest_path();
        let mut manifest = self.load_manifest(&manifest_path, true)?;

        let reconciler = Reconciler::new(
            self.registry.as_ref(),
            self.confirm.as_ref(),
            &self.sync_root,
            &self.cache_root,
        );
        let mut entries = Vec::with_capacity(requests.len());
        for request in requests {
            match self.sync_one(&reconciler, &mut manifest, request, overwrite, caller) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::error!(
                        origin = %e.origin().unwrap_or(request.origin.as_str()),
                        caller = %caller,
                        error = %e,
                        "Synchronization aborted"
                    );
                    manifest.save(&manifest_path)?;
                    return Err(e);
                }
            }
        }

        manifest.save(&manifest_path)?;
        let report = SyncReport { manifest, entries };
        tracing::info!(
            caller = %caller,
            fetched = report.fetched(),
            kept = report.entries.len() - report.fetched(),
            "Synchronization finished"
        );
        Ok(report)
    }

    fn sync_one(
        &self,
        reconciler: &Reconciler<'_>,
        manifest: &mut Manifest,
        request: &DependencyRequest,
        overwrite: bool,
        caller: &str,
    ) -> Result<SyncEntry> {
        let dependency = validate(request, &self.sync_root, caller)?;
        let previous = manifest.get(&dependency.origin).cloned();
        let outcome = reconciler.reconcile(previous.as_ref(), &dependency, overwrite, caller)?;

        manifest.insert(outcome.descriptor.clone());
        if let Some(hook) = &self.hook {
            hook.after_sync(&outcome.descriptor, self.confirm.as_ref())?;
        }
        Ok(SyncEntry::new(&outcome.descriptor, outcome.reason))
    }

    /// Report the state of every module recorded in the manifest.
    pub fn status(&self) -> Result<Vec<ModuleStatus>> {
        let _guard = self.lock.acquire();
        let manifest = self.load_manifest(&self.manifest_path(), false)?;

        manifest
            .modules()
            .iter()
            .map(|module| -> Result<ModuleStatus> {
                let state = if std::fs::symlink_metadata(module.sync_location()).is_err() {
                    ModuleState::Missing
                } else if module.is_local() {
                    ModuleState::Linked
                } else if detect::is_modified(module.sync_location(), module.cache_location())? {
                    ModuleState::Modified
                } else {
                    ModuleState::Clean
                };
                Ok(ModuleStatus {
                    origin: module.origin().to_string(),
                    module: module.module_id().to_string(),
                    fingerprint: module.fingerprint().to_string(),
                    sync_location: module.sync_location().to_path_buf(),
                    state,
                })
            })
            .collect()
    }

    /// Create the sync root as a package, ignored by version control.
    fn prepare_root(&self) -> Result<()> {
        if self.sync_root.exists() && !self.sync_root.is_dir() {
            return Err(Error::SyncRootNotDirectory {
                path: self.sync_root.clone(),
            });
        }
        std::fs::create_dir_all(&self.sync_root)
            .map_err(|e| modsync_fs::Error::io(&self.sync_root, e))?;
        if io::touch(&self.sync_root.join(PACKAGE_MARKER))? {
            tracing::debug!(root = %self.sync_root.display(), "Created sync root");
        }
        io::append_line_once(
            &NormalizedPath::new(self.sync_root.join(IGNORE_FILE)),
            IGNORE_COMMENT,
            IGNORE_RULE,
        )?;
        Ok(())
    }

    /// Load the manifest, rebased onto this engine's roots. With
    /// `bootstrap`, an absent manifest is written out empty first.
    fn load_manifest(&self, path: &Path, bootstrap: bool) -> Result<Manifest> {
        let empty = || Manifest::new(&self.sync_root, &self.cache_root);
        let mut manifest = match Manifest::load(path)? {
            Some(manifest) => manifest,
            None if bootstrap => {
                empty().save(path)?;
                Manifest::load(path)?.unwrap_or_else(empty)
            }
            None => empty(),
        };

        let (old_sync, old_cache) = (
            manifest.sync_root().to_path_buf(),
            manifest.cache_root().to_path_buf(),
        );
        if manifest.rebase(&self.sync_root, &self.cache_root) {
            tracing::warn!(
                old_sync_root = %old_sync.display(),
                old_cache_root = %old_cache.display(),
                sync_root = %self.sync_root.display(),
                cache_root = %self.cache_root.display(),
                "Manifest was written for different roots, relocating its entries"
            );
        }
        Ok(manifest)
    }
}
