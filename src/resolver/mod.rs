//! Reference resolution.
//!
//! Turns the verbatim `srcs`/`deps` strings of every build file into a
//! checked, acyclic [`TargetGraph`]. Resolution is pure: all file I/O
//! happens while loading the workspace.

pub mod errors;
pub mod graph;

pub use errors::{ResolveError, Unresolved};
pub use graph::{EdgeKind, TargetGraph};
