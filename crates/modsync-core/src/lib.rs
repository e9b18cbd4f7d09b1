//! Dependency synchronization engine for modsync
//!
//! Fetches, caches and materializes a flat list of module dependencies
//! into a sync root, keeping a manifest of what was synced:
//!
//! ```text
//!   SyncEngine::sync
//!        |
//!   validate ──> Reconciler ──> fetch_remote / fetch_local ──> Manifest
//!                    |
//!              is_modified, Registry::latest_fingerprint
//! ```
//!
//! - **Manifest codec**: the persisted `modules.mod` file ([`manifest`])
//! - **Validator**: origin ids, destination names, local vs. remote revisions ([`validate`])
//! - **Fetchers**: registry snapshots and local links ([`fetch`])
//! - **Modification detector**: working copy vs. pristine snapshot ([`detect`])
//! - **Reconciliation**: the per-dependency decision table ([`reconcile`])
//! - **Driver**: locking, root preparation, manifest write-back ([`engine`])
//!
//! Registries, confirmation prompts and post-sync hooks are injected through
//! the [`Registry`], [`Confirm`] and [`PostSyncHook`] traits.

pub mod cache;
pub mod config;
pub mod confirm;
pub mod descriptor;
pub mod detect;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod reconcile;
pub mod registry;
pub mod requirements;
pub mod validate;
pub mod version;

pub use config::{ProjectConfig, RegistryKind};
pub use confirm::{AutoConfirm, Confirm, ConfirmFn};
pub use descriptor::{Fingerprint, ModuleDescriptor, ModuleId, OriginId};
pub use engine::{ModuleState, ModuleStatus, SyncEngine, SyncEngineBuilder, SyncEntry, SyncLock, SyncReport};
pub use error::{Error, Result};
pub use manifest::{Manifest, ManifestParseError};
pub use reconcile::{Action, Reason};
pub use registry::{DirectoryRegistry, Registry, RegistryError, Snapshot};
pub use requirements::{PackageEnvironment, PipEnvironment, PostSyncHook, RequirementsInstaller};
pub use validate::{DependencyRequest, Revision, ValidatedDependency};
