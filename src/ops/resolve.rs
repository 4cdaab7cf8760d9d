//! Workspace loading and resolution operations.

use anyhow::{bail, Result};

use crate::core::reference::resolve_label;
use crate::core::target::TargetLabel;
use crate::core::Workspace;
use crate::resolver::TargetGraph;
use crate::util::config::Config;
use crate::util::GlobalContext;

/// A loaded workspace with its configuration and resolved graph.
#[derive(Debug)]
pub struct ResolvedWorkspace {
    pub config: Config,
    pub workspace: Workspace,
    pub graph: TargetGraph,
}

/// Find, load, and resolve the workspace around the working directory.
pub fn resolve_workspace(ctx: &GlobalContext) -> Result<ResolvedWorkspace> {
    let root = ctx.find_workspace_root()?;
    let config = ctx.load_config(&root);

    let workspace = Workspace::load(&root, &config)?;
    tracing::debug!(
        "loaded {} target(s) from {} build file(s)",
        workspace.target_count(),
        workspace.build_files().len()
    );

    let graph = TargetGraph::resolve(&workspace)?;

    Ok(ResolvedWorkspace {
        config,
        workspace,
        graph,
    })
}

/// Turn command-line target specs into labels.
///
/// Specs use the build file convention, anchored at the package of the
/// working directory: `lib+common_proto`, `+proto`, or a bare `proto`.
/// Every spec must name a declared target.
pub fn select_targets(
    resolved: &ResolvedWorkspace,
    specs: &[String],
    current_package: &str,
) -> Result<Vec<TargetLabel>> {
    let mut labels = Vec::with_capacity(specs.len());

    for spec in specs {
        let label = resolve_label(spec, current_package)?;
        if !resolved.graph.contains(&label) {
            let available: Vec<String> = resolved
                .graph
                .labels()
                .filter(|l| l.package() == label.package())
                .map(|l| l.to_string())
                .collect();
            bail!(
                "unknown target `{}`\n\
                 available targets in this package: {}\n\
                 hint: use `keel targets` to see all targets",
                label,
                if available.is_empty() {
                    "(none)".to_string()
                } else {
                    available.join(", ")
                }
            );
        }
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    Ok(labels)
}
