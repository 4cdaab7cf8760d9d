//! Core data structures for Keel.
//!
//! This module contains the declaration side of Keel:
//! - Targets, kinds and labels
//! - The file-scoped target registry
//! - Target references (`package+name`)
//! - Build file evaluation and workspace loading

pub mod build_file;
pub mod reference;
pub mod registry;
pub mod target;
pub mod workspace;

pub use build_file::{BuildFile, LoadError, BUILD_FILE_ALIAS, BUILD_FILE_NAME};
pub use reference::TargetRef;
pub use registry::{DeclareError, TargetRegistry};
pub use target::{Target, TargetKind, TargetLabel};
pub use workspace::Workspace;
