//! Protobuf build system.
//!
//! This module turns a resolved target graph into protoc invocations and
//! runs them incrementally.

pub mod context;
pub mod executor;
pub mod fingerprint;
pub mod plan;
pub mod protoc;

pub use context::BuildContext;
pub use executor::{Artifact, BuildExecutor};
pub use plan::{BuildPlan, BuildStep, DescriptorStep, GenerateStep};
pub use protoc::{ProtoCompiler, Protoc};
