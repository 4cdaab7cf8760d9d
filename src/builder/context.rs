//! Build context - where outputs go and what every protoc call shares.

use std::path::{Path, PathBuf};

use crate::core::target::TargetLabel;
use crate::core::Workspace;
use crate::util::config::Config;

/// Build context shared by planning and execution.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Workspace root
    pub workspace_root: PathBuf,

    /// Output directory
    pub out_dir: PathBuf,

    /// Extra include directories from configuration (absolute)
    pub include_dirs: Vec<PathBuf>,

    /// Extra arguments for every protoc invocation
    pub protoc_args: Vec<String>,
}

impl BuildContext {
    /// Create a build context for a loaded workspace.
    pub fn new(ws: &Workspace, config: &Config) -> Self {
        let include_dirs = config
            .protoc
            .include_dirs
            .iter()
            .map(|dir| ws.root().join(dir))
            .collect();

        BuildContext {
            workspace_root: ws.root().to_path_buf(),
            out_dir: ws.out_dir().to_path_buf(),
            include_dirs,
            protoc_args: config.protoc.args.clone(),
        }
    }

    /// Output directory of a package.
    pub fn package_out_dir(&self, package: &str) -> PathBuf {
        if package.is_empty() {
            self.out_dir.clone()
        } else {
            self.out_dir.join(package)
        }
    }

    /// Descriptor set written for a `proto` target.
    pub fn descriptor_path(&self, label: &TargetLabel) -> PathBuf {
        self.package_out_dir(label.package())
            .join(format!("{}.descriptor", label.name()))
    }

    /// Directory receiving generated sources of a `protocc` target.
    pub fn generated_dir(&self, label: &TargetLabel) -> PathBuf {
        self.package_out_dir(label.package()).join(label.name())
    }

    /// Fingerprint store for incremental builds.
    pub fn fingerprint_path(&self) -> PathBuf {
        self.out_dir.join(".fingerprints.json")
    }

    /// Directory of a package inside the workspace.
    pub fn package_dir(&self, package: &str) -> PathBuf {
        package_dir(&self.workspace_root, package)
    }
}

fn package_dir(root: &Path, package: &str) -> PathBuf {
    if package.is_empty() {
        root.to_path_buf()
    } else {
        root.join(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BuildContext {
        BuildContext {
            workspace_root: PathBuf::from("/ws"),
            out_dir: PathBuf::from("/ws/.keel/out"),
            include_dirs: Vec::new(),
            protoc_args: Vec::new(),
        }
    }

    #[test]
    fn test_output_layout() {
        let ctx = ctx();
        let proto = TargetLabel::new("lib/imagereader", "proto");
        assert_eq!(
            ctx.descriptor_path(&proto),
            PathBuf::from("/ws/.keel/out/lib/imagereader/proto.descriptor")
        );

        let lib = TargetLabel::new("", "proto_lib");
        assert_eq!(ctx.generated_dir(&lib), PathBuf::from("/ws/.keel/out/proto_lib"));
        assert_eq!(ctx.package_dir(""), PathBuf::from("/ws"));
        assert_eq!(ctx.package_dir("lib"), PathBuf::from("/ws/lib"));
    }
}
