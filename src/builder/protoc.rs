//! The protobuf compiler driver.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::builder::plan::{DescriptorStep, GenerateStep};
use crate::util::config::ProtocConfig;
use crate::util::diagnostic::suggestions;
use crate::util::fs::ensure_dir;
use crate::util::process::{find_protoc, ProcessBuilder};

/// Something that can turn schemas into descriptors and C++ sources.
pub trait ProtoCompiler {
    /// Identity folded into step fingerprints.
    fn identity(&self) -> String;

    /// Compile a descriptor set.
    fn compile_descriptors(&self, step: &DescriptorStep) -> Result<()>;

    /// Generate C++ sources.
    fn generate_cpp(&self, step: &GenerateStep) -> Result<()>;
}

/// `protoc` found on this machine.
#[derive(Debug, Clone)]
pub struct Protoc {
    path: PathBuf,
}

impl Protoc {
    /// Use the protoc at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Protoc { path: path.into() }
    }

    /// Locate protoc from configuration, `PROTOC`, or PATH.
    pub fn locate(config: &ProtocConfig) -> Result<Self> {
        let path = find_protoc(config.path.as_deref()).ok_or_else(|| {
            anyhow!("could not find protoc\n\nhelp: {}", suggestions::NO_PROTOC)
        })?;
        tracing::debug!("using protoc at {}", path.display());
        Ok(Protoc::new(path))
    }

    /// Path of the protoc binary.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Command line for a descriptor step.
    pub fn descriptor_command(&self, step: &DescriptorStep) -> ProcessBuilder {
        ProcessBuilder::new(&self.path)
            .args(include_args(&step.include_dirs))
            .arg("--include_imports")
            .arg("--include_source_info")
            .arg(format!("--descriptor_set_out={}", step.output.display()))
            .args(&step.args)
            .args(&step.sources)
    }

    /// Command line for a code generation step.
    pub fn generate_command(&self, step: &GenerateStep) -> ProcessBuilder {
        ProcessBuilder::new(&self.path)
            .args(include_args(&step.include_dirs))
            .arg(format!("--cpp_out={}", step.out_dir.display()))
            .args(&step.args)
            .args(&step.protos)
    }
}

impl ProtoCompiler for Protoc {
    fn identity(&self) -> String {
        self.path.display().to_string()
    }

    fn compile_descriptors(&self, step: &DescriptorStep) -> Result<()> {
        if let Some(parent) = step.output.parent() {
            ensure_dir(parent)?;
        }
        self.descriptor_command(step).exec_and_check()?;
        Ok(())
    }

    fn generate_cpp(&self, step: &GenerateStep) -> Result<()> {
        ensure_dir(&step.out_dir)?;
        self.generate_command(step).exec_and_check()?;
        Ok(())
    }
}

fn include_args(dirs: &[PathBuf]) -> Vec<String> {
    dirs.iter().map(|d| format!("-I{}", d.display())).collect()
}
