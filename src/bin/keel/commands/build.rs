//! `keel build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use keel::builder::Protoc;
use keel::ops::{build, resolve_workspace, select_targets, BuildOptions};
use keel::GlobalContext;

pub fn execute(args: BuildArgs, ctx: &GlobalContext) -> Result<()> {
    let resolved = resolve_workspace(ctx)?;
    let current = ctx
        .current_package(resolved.workspace.root())
        .unwrap_or_default();
    let targets = select_targets(&resolved, &args.targets, &current)?;

    let protoc = Protoc::locate(&resolved.config.protoc)?;

    let opts = BuildOptions {
        targets,
        force: args.force,
        verbose: ctx.is_verbose(),
    };

    let result = build(&resolved, &opts, &protoc)?;

    if ctx.is_verbose() {
        for artifact in result.artifacts.iter().filter(|a| !a.fresh) {
            for output in &artifact.outputs {
                eprintln!("     Created {}", output.display());
            }
        }
    }

    Ok(())
}
