//! Filesystem primitives for modsync
//!
//! Provides forward-slash normalized paths, atomic writes, and the
//! directory helpers the synchronization engine builds on.

pub mod checksum;
pub mod error;
pub mod io;
pub mod path;

pub use error::{Error, Result};
pub use path::NormalizedPath;
