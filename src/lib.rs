//! Keel - declarative protobuf build targets
//!
//! This crate provides the library side of Keel: the file-scoped target
//! registry, build file evaluation, workspace loading, reference
//! resolution, and the build plan that drives `protoc`.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

pub use core::{
    build_file::BuildFile,
    registry::TargetRegistry,
    target::{Target, TargetKind, TargetLabel},
    workspace::Workspace,
};

pub use resolver::TargetGraph;
pub use util::context::GlobalContext;
