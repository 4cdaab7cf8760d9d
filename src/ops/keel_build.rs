//! Implementation of the build-side commands: `keel plan`, `keel build`, `keel clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::{Artifact, BuildContext, BuildExecutor, BuildPlan, ProtoCompiler};
use crate::core::target::TargetLabel;
use crate::ops::resolve::ResolvedWorkspace;
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::GlobalContext;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Targets to build with their dependencies (empty = everything)
    pub targets: Vec<TargetLabel>,

    /// Ignore fingerprints
    pub force: bool,

    /// Verbose output
    pub verbose: bool,
}

/// Result of a build.
#[derive(Debug)]
pub struct BuildResult {
    pub plan: BuildPlan,
    pub artifacts: Vec<Artifact>,
}

/// Plan a build of the selected targets.
pub fn plan(resolved: &ResolvedWorkspace, targets: &[TargetLabel]) -> Result<BuildPlan> {
    let ctx = BuildContext::new(&resolved.workspace, &resolved.config);
    let filter = (!targets.is_empty()).then_some(targets);
    BuildPlan::new(&ctx, &resolved.workspace, &resolved.graph, filter)
}

/// Plan and run a build with the given compiler.
pub fn build(
    resolved: &ResolvedWorkspace,
    opts: &BuildOptions,
    compiler: &dyn ProtoCompiler,
) -> Result<BuildResult> {
    let ctx = BuildContext::new(&resolved.workspace, &resolved.config);
    let filter = (!opts.targets.is_empty()).then_some(opts.targets.as_slice());
    let plan = BuildPlan::new(&ctx, &resolved.workspace, &resolved.graph, filter)?;

    if plan.steps.is_empty() {
        tracing::info!("nothing to build");
    }

    let artifacts = BuildExecutor::new(&ctx, compiler)
        .force(opts.force)
        .verbose(opts.verbose)
        .execute(&plan)?;

    Ok(BuildResult { plan, artifacts })
}

/// Remove the output directory of the workspace around the working
/// directory. Build files are not evaluated, so this works on a broken tree.
pub fn clean(ctx: &GlobalContext) -> Result<PathBuf> {
    let root = ctx.find_workspace_root()?;
    let out_dir = ctx.load_config(&root).out_dir(&root);
    remove_dir_all_if_exists(&out_dir)?;
    Ok(out_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::Path;
    use tempfile::TempDir;

    use crate::builder::{DescriptorStep, GenerateStep};
    use crate::ops::resolve::resolve_workspace;

    #[derive(Default)]
    struct CountingCompiler {
        runs: Cell<usize>,
    }

    impl ProtoCompiler for CountingCompiler {
        fn identity(&self) -> String {
            "counting".to_string()
        }

        fn compile_descriptors(&self, step: &DescriptorStep) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            std::fs::create_dir_all(step.output.parent().unwrap())?;
            std::fs::write(&step.output, b"")?;
            Ok(())
        }

        fn generate_cpp(&self, step: &GenerateStep) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            for output in &step.outputs {
                std::fs::create_dir_all(output.parent().unwrap())?;
                std::fs::write(output, b"")?;
            }
            Ok(())
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn resolved(root: &Path) -> ResolvedWorkspace {
        write(
            root,
            "Keel.toml",
            r#"
[workspace]

[[target]]
kind = "proto"
name = "a"
srcs = ["a.proto"]

[[target]]
kind = "protocc"
name = "a_lib"
srcs = ["+a"]

[[target]]
kind = "proto"
name = "b"
srcs = ["b.proto"]
"#,
        );
        write(root, "a.proto", "syntax = \"proto3\";\n");
        write(root, "b.proto", "syntax = \"proto3\";\n");
        resolve_workspace(&GlobalContext::with_cwd(root.to_path_buf())).unwrap()
    }

    #[test]
    fn test_plan_subset() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolved(tmp.path());

        let all = plan(&resolved, &[]).unwrap();
        assert_eq!(all.steps.len(), 3);

        let subset = plan(&resolved, &[TargetLabel::new("", "a_lib")]).unwrap();
        let targets: Vec<_> = subset.steps.iter().map(|s| s.target()).collect();
        assert_eq!(targets, ["+a", "+a_lib"]);
    }

    #[test]
    fn test_build_and_clean() {
        let tmp = TempDir::new().unwrap();
        let resolved = resolved(tmp.path());
        let compiler = CountingCompiler::default();

        let result = build(&resolved, &BuildOptions::default(), &compiler).unwrap();
        assert_eq!(result.artifacts.len(), 3);
        assert_eq!(compiler.runs.get(), 3);
        assert!(tmp.path().join(".keel/out/a_lib/a.pb.h").exists());

        let removed = clean(&GlobalContext::with_cwd(tmp.path().to_path_buf())).unwrap();
        assert_eq!(removed, tmp.path().join(".keel/out"));
        assert!(!removed.exists());
    }
}
