//! Build plan generation.
//!
//! A BuildPlan lists one protoc step per target, dependencies first.
//! `proto` targets produce a descriptor set; `protocc` targets generate
//! C++ sources from the schemas of the `proto` targets they reference.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::builder::context::BuildContext;
use crate::core::target::{TargetKind, TargetLabel};
use crate::core::Workspace;
use crate::resolver::{EdgeKind, TargetGraph};
use crate::util::fs::clean_path;

/// A complete build plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    /// All build steps in execution order
    pub steps: Vec<BuildStep>,
}

/// A build step in the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildStep {
    /// Compile schemas into a descriptor set
    Descriptor(DescriptorStep),
    /// Generate C++ sources from schemas
    Generate(GenerateStep),
}

/// Compile a `proto` target's schema files to a descriptor set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorStep {
    /// Target label
    pub target: String,

    /// Schema files of the target
    pub sources: Vec<PathBuf>,

    /// protoc `-I` directories, in search order
    pub include_dirs: Vec<PathBuf>,

    /// Output descriptor set
    pub output: PathBuf,

    /// Extra protoc arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Every file whose contents affect the output
    pub inputs: Vec<PathBuf>,
}

/// Generate C++ sources for a `protocc` target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateStep {
    /// Target label
    pub target: String,

    /// Schema files of the referenced `proto` targets
    pub protos: Vec<PathBuf>,

    /// protoc `-I` directories, in search order
    pub include_dirs: Vec<PathBuf>,

    /// Directory receiving the generated files
    pub out_dir: PathBuf,

    /// Expected `.pb.h`/`.pb.cc` files
    pub outputs: Vec<PathBuf>,

    /// Extra protoc arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Every file whose contents affect the output
    pub inputs: Vec<PathBuf>,
}

impl BuildStep {
    /// Label of the target this step builds.
    pub fn target(&self) -> &str {
        match self {
            BuildStep::Descriptor(step) => &step.target,
            BuildStep::Generate(step) => &step.target,
        }
    }

    /// Short description used in progress output.
    pub fn description(&self) -> &'static str {
        match self {
            BuildStep::Descriptor(_) => "descriptor",
            BuildStep::Generate(_) => "c++",
        }
    }

    /// Files this step produces.
    pub fn outputs(&self) -> Vec<PathBuf> {
        match self {
            BuildStep::Descriptor(step) => vec![step.output.clone()],
            BuildStep::Generate(step) => step.outputs.clone(),
        }
    }

    /// Files this step reads.
    pub fn inputs(&self) -> &[PathBuf] {
        match self {
            BuildStep::Descriptor(step) => &step.inputs,
            BuildStep::Generate(step) => &step.inputs,
        }
    }
}

impl BuildPlan {
    /// Plan a build of the whole workspace, or of `filter` and everything
    /// it depends on.
    pub fn new(
        ctx: &BuildContext,
        ws: &Workspace,
        graph: &TargetGraph,
        filter: Option<&[TargetLabel]>,
    ) -> Result<Self> {
        let order = match filter {
            Some(labels) => graph.closure(labels),
            None => graph.topological_order(),
        };

        let planner = Planner { ctx, ws, graph };
        let mut steps = Vec::with_capacity(order.len());

        for label in &order {
            let step = match graph.kind(label) {
                Some(TargetKind::Proto) => BuildStep::Descriptor(planner.descriptor_step(label)?),
                Some(TargetKind::ProtoCc) => BuildStep::Generate(planner.generate_step(label)?),
                None => return Err(anyhow!("target `{}` is not in the graph", label)),
            };
            steps.push(step);
        }

        tracing::debug!("planned {} step(s)", steps.len());
        Ok(BuildPlan { steps })
    }

    /// Number of descriptor steps.
    pub fn descriptor_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, BuildStep::Descriptor(_)))
            .count()
    }

    /// Number of code generation steps.
    pub fn generate_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, BuildStep::Generate(_)))
            .count()
    }

    /// Serialize the plan as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct Planner<'a> {
    ctx: &'a BuildContext,
    ws: &'a Workspace,
    graph: &'a TargetGraph,
}

impl Planner<'_> {
    fn descriptor_step(&self, label: &TargetLabel) -> Result<DescriptorStep> {
        let sources = self.schema_files(label)?;
        let include_dirs = self.include_dirs(label);
        let inputs = self.schema_inputs(label)?;

        Ok(DescriptorStep {
            target: label.to_string(),
            sources,
            include_dirs,
            output: self.ctx.descriptor_path(label),
            args: self.ctx.protoc_args.clone(),
            inputs,
        })
    }

    fn generate_step(&self, label: &TargetLabel) -> Result<GenerateStep> {
        let schemas = self.graph.deps_of_kind(label, EdgeKind::Source);

        let mut protos = Vec::new();
        let mut include_dirs = Vec::new();
        let mut inputs = Vec::new();
        for schema in &schemas {
            protos.extend(self.schema_files(schema)?);
            include_dirs.extend(self.include_dirs(schema));
            inputs.extend(self.schema_inputs(schema)?);
        }
        dedup(&mut protos);
        dedup(&mut include_dirs);
        dedup(&mut inputs);

        let out_dir = self.ctx.generated_dir(label);
        let mut outputs = Vec::new();
        for proto in &protos {
            let name = virtual_path(proto, &include_dirs).ok_or_else(|| {
                anyhow!(
                    "{} is not inside any include directory of `{}`",
                    proto.display(),
                    label
                )
            })?;
            outputs.push(out_dir.join(name.with_extension("pb.h")));
            outputs.push(out_dir.join(name.with_extension("pb.cc")));
        }

        Ok(GenerateStep {
            target: label.to_string(),
            protos,
            include_dirs,
            out_dir,
            outputs,
            args: self.ctx.protoc_args.clone(),
            inputs,
        })
    }

    /// Absolute schema files of a `proto` target.
    fn schema_files(&self, label: &TargetLabel) -> Result<Vec<PathBuf>> {
        let target = self
            .ws
            .target(label)
            .ok_or_else(|| anyhow!("target `{}` is not declared", label))?;
        let dir = self.ctx.package_dir(label.package());

        Ok(target
            .sources()
            .iter()
            .map(|src| clean_path(&dir.join(src)))
            .collect())
    }

    /// Schema files of a `proto` target and of every `proto` target it
    /// imports from.
    fn schema_inputs(&self, label: &TargetLabel) -> Result<Vec<PathBuf>> {
        let mut inputs = Vec::new();
        for dep in self.graph.transitive_deps(label) {
            inputs.extend(self.schema_files(&dep)?);
        }
        inputs.extend(self.schema_files(label)?);
        Ok(inputs)
    }

    /// Include path of a `proto` target: its own package, the packages of
    /// its transitive schema deps, the workspace root, then configured
    /// extras.
    fn include_dirs(&self, label: &TargetLabel) -> Vec<PathBuf> {
        let mut dirs = vec![self.ctx.package_dir(label.package())];

        // nearest deps first
        let mut deps = self.graph.transitive_deps(label);
        deps.reverse();
        dirs.extend(deps.iter().map(|dep| self.ctx.package_dir(dep.package())));

        dirs.push(self.ctx.workspace_root.clone());
        dirs.extend(self.ctx.include_dirs.iter().cloned());
        dedup(&mut dirs);
        dirs
    }
}

/// Name protoc gives a schema: its path below the first include directory
/// containing it.
fn virtual_path(proto: &Path, include_dirs: &[PathBuf]) -> Option<PathBuf> {
    include_dirs
        .iter()
        .find_map(|dir| proto.strip_prefix(dir).ok())
        .map(Path::to_path_buf)
}

fn dedup(paths: &mut Vec<PathBuf>) {
    let mut seen = HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
}
