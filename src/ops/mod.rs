//! High-level operations.
//!
//! This module contains the implementation of Keel commands.

pub mod keel_build;
pub mod resolve;

pub use keel_build::{build, clean, plan, BuildOptions, BuildResult};
pub use resolve::{resolve_workspace, select_targets, ResolvedWorkspace};
