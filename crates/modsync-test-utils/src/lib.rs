//! Shared test utilities for the modsync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`] — origin repositories with real commit history
//! - [`workspace`] — [`TestWorkspace`](workspace::TestWorkspace) with a
//!   directory registry, cache root and sync root

pub mod git;
pub mod workspace;
