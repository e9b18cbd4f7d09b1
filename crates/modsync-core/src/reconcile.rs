//! Reconciliation of one dependency against its previous manifest entry
//!
//! Decision table, first matching row wins:
//!
//! | previous | overwrite | id changed | working copy | upstream changed | modified | action |
//! |----------|-----------|------------|--------------|------------------|----------|--------|
//! | no       |           |            |              |                  |          | fetch |
//! | yes      | yes       |            |              |                  |          | prompt overwrite |
//! | yes      | no        | yes        |              |                  |          | prompt replace |
//! | yes      | no        | no         | missing      |                  |          | fetch |
//! | yes      | no        | no         | present      | no               |          | keep |
//! | yes      | no        | no         | present      | yes              | no       | fetch, warn |
//! | yes      | no        | no         | present      | yes              | yes      | keep, warn |
//!
//! Local dependencies stop after the "missing" row and are kept: they are
//! links, so their edits are always live. The upstream fingerprint and the
//! modification status are only computed when the last rows need them.

use std::fmt;
use std::path::Path;

use modsync_fs::io;

use crate::confirm::Confirm;
use crate::descriptor::{ModuleDescriptor, ModuleId};
use crate::registry::Registry;
use crate::validate::{Revision, ValidatedDependency};
use crate::{Error, Result, detect, fetch};

/// What happens to a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Fetch,
    Keep,
}

/// Which row of the decision table applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// No previous entry for this origin
    New,
    OverwriteConfirmed,
    OverwriteDeclined,
    /// Revision or destination differs from the previous entry
    ReplaceConfirmed,
    ReplaceDeclined,
    /// Previous entry exists but its working copy is gone
    WorkingCopyMissing,
    /// Local module with unchanged id
    Linked,
    /// Upstream fingerprint unchanged
    InSync,
    /// Upstream advanced and the working copy was untouched
    UpstreamAdvanced,
    /// Upstream advanced but local edits were kept
    LocalEditsPreserved,
}

impl Reason {
    pub fn action(self) -> Action {
        match self {
            Self::New
            | Self::OverwriteConfirmed
            | Self::ReplaceConfirmed
            | Self::WorkingCopyMissing
            | Self::UpstreamAdvanced => Action::Fetch,
            Self::OverwriteDeclined
            | Self::ReplaceDeclined
            | Self::Linked
            | Self::InSync
            | Self::LocalEditsPreserved => Action::Keep,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::New => "not synced before",
            Self::OverwriteConfirmed => "overwrite confirmed",
            Self::OverwriteDeclined => "overwrite declined",
            Self::ReplaceConfirmed => "replacement confirmed",
            Self::ReplaceDeclined => "replacement declined",
            Self::WorkingCopyMissing => "working copy missing",
            Self::Linked => "linked to local directory",
            Self::InSync => "already in sync",
            Self::UpstreamAdvanced => "upstream advanced, no local edits",
            Self::LocalEditsPreserved => "upstream advanced, local edits preserved",
        };
        f.write_str(text)
    }
}

/// Result of reconciling one dependency.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub descriptor: ModuleDescriptor,
    pub reason: Reason,
}

impl Outcome {
    pub fn fetched(&self) -> bool {
        self.reason.action() == Action::Fetch
    }
}

/// Applies the decision table and runs the chosen fetcher.
pub struct Reconciler<'a> {
    registry: &'a dyn Registry,
    confirm: &'a dyn Confirm,
    sync_root: &'a Path,
    cache_root: &'a Path,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        registry: &'a dyn Registry,
        confirm: &'a dyn Confirm,
        sync_root: &'a Path,
        cache_root: &'a Path,
    ) -> Self {
        Self {
            registry,
            confirm,
            sync_root,
            cache_root,
        }
    }

    /// Decide what to do with `dependency` given its `previous` entry.
    ///
    /// `overwrite` is the global flag; the dependency's own flag is OR-ed in.
    pub fn decide(
        &self,
        previous: Option<&ModuleDescriptor>,
        dependency: &ValidatedDependency,
        overwrite: bool,
    ) -> Result<Reason> {
        let Some(previous) = previous else {
            return Ok(Reason::New);
        };
        let module_id = dependency.module_id();

        if overwrite || dependency.overwrite {
            let yes = self.confirm.confirm(
                &format!(
                    "{} is already synced to {}. Overwrite it with a fresh copy?",
                    previous.module_id(),
                    previous.sync_location().display()
                ),
                &format!("Overwriting {module_id}"),
                &format!("Keeping previous {}", previous.module_id()),
            );
            return Ok(if yes {
                Reason::OverwriteConfirmed
            } else {
                Reason::OverwriteDeclined
            });
        }

        let sync_location = dependency.sync_location(self.sync_root);
        if id_changed(previous, &module_id) || previous.sync_location() != sync_location {
            let yes = self.confirm.confirm(
                &format!(
                    "{} was previously synced as {} at {}. Replace it with {} at {}?",
                    dependency.origin,
                    previous.module_id(),
                    previous.sync_location().display(),
                    module_id,
                    sync_location.display()
                ),
                &format!("Replacing {} with {module_id}", previous.module_id()),
                &format!("Keeping previous {}", previous.module_id()),
            );
            return Ok(if yes {
                Reason::ReplaceConfirmed
            } else {
                Reason::ReplaceDeclined
            });
        }

        if std::fs::symlink_metadata(previous.sync_location()).is_err() {
            return Ok(Reason::WorkingCopyMissing);
        }

        if dependency.revision.is_local() {
            return Ok(Reason::Linked);
        }

        let latest = self
            .registry
            .latest_fingerprint(&dependency.origin, &dependency.revision.label())
            .map_err(|e| Error::fetch(&dependency.origin, e))?;
        if latest == previous.fingerprint().as_str() {
            return Ok(Reason::InSync);
        }

        if detect::is_modified(previous.sync_location(), previous.cache_location())? {
            Ok(Reason::LocalEditsPreserved)
        } else {
            Ok(Reason::UpstreamAdvanced)
        }
    }

    /// Decide, then fetch or keep, and log the outcome.
    pub fn reconcile(
        &self,
        previous: Option<&ModuleDescriptor>,
        dependency: &ValidatedDependency,
        overwrite: bool,
        caller: &str,
    ) -> Result<Outcome> {
        let reason = self.decide(previous, dependency, overwrite)?;
        let module_id = dependency.module_id();

        match reason {
            Reason::UpstreamAdvanced => tracing::warn!(
                module = %module_id,
                caller = %caller,
                "Upstream changed and the working copy has no local edits, fetching the new version"
            ),
            Reason::LocalEditsPreserved => tracing::warn!(
                module = %module_id,
                caller = %caller,
                "Upstream changed but the working copy has local edits, keeping it. \
                 Sync with overwrite to discard the edits"
            ),
            _ => tracing::info!(module = %module_id, caller = %caller, reason = %reason, "Reconciled"),
        }

        // An old location inside the new one is cleared by the fetch itself
        let sync_location = dependency.sync_location(self.sync_root);
        let stale = match (reason, previous) {
            (Reason::ReplaceConfirmed | Reason::OverwriteConfirmed, Some(previous))
                if !previous.sync_location().starts_with(&sync_location) =>
            {
                Some(previous)
            }
            _ => None,
        };
        let nested = stale.is_some_and(|previous| sync_location.starts_with(previous.sync_location()));

        if let Some(previous) = stale
            && nested
        {
            remove_stale(previous)?;
        }
        let descriptor = match (reason.action(), previous) {
            (Action::Keep, Some(previous)) => previous.clone(),
            _ => self.fetch(dependency)?,
        };
        if let Some(previous) = stale
            && !nested
        {
            remove_stale(previous)?;
        }
        Ok(Outcome { descriptor, reason })
    }

    fn fetch(&self, dependency: &ValidatedDependency) -> Result<ModuleDescriptor> {
        let sync_location = dependency.sync_location(self.sync_root);
        match &dependency.revision {
            Revision::Local(source) => fetch::fetch_local(&dependency.origin, source, &sync_location),
            Revision::Remote(label) => fetch::fetch_remote(
                self.registry,
                &dependency.origin,
                label,
                &sync_location,
                self.cache_root,
            ),
        }
    }
}

/// Remove the working copy a replaced module left at its old location.
fn remove_stale(previous: &ModuleDescriptor) -> Result<()> {
    if io::remove_dir_or_link(previous.sync_location())? {
        tracing::info!(
            module = %previous.module_id(),
            path = %previous.sync_location().display(),
            "Removed working copy at previous location"
        );
    }
    Ok(())
}

fn id_changed(previous: &ModuleDescriptor, requested: &ModuleId) -> bool {
    previous.origin() != requested.origin() || previous.revision() != requested.revision()
}
