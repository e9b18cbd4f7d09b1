//! Git-backed module registry for modsync
//!
//! Each origin `namespace/name` is a git repository at
//! `<base>/<namespace>/<name>`, where `<base>` is a URL or a local path.
//! Revisions are branch names, tag names or commit ids; fingerprints are
//! commit ids.
//!
//! Fetched history is kept in a bare mirror inside the shared cache:
//!
//! ```text
//! <cache_root>/modules--<namespace>--<name>/
//!   mirror.git/
//!   snapshots/<commit id>/...
//! ```

pub mod error;
pub mod registry;

pub use error::{Error, Result};
pub use registry::GitRegistry;
