//! `keel plan` command

use anyhow::Result;

use crate::cli::PlanArgs;
use keel::ops::{plan, resolve_workspace, select_targets};
use keel::GlobalContext;

pub fn execute(args: PlanArgs, ctx: &GlobalContext) -> Result<()> {
    let resolved = resolve_workspace(ctx)?;
    let current = ctx
        .current_package(resolved.workspace.root())
        .unwrap_or_default();
    let targets = select_targets(&resolved, &args.targets, &current)?;

    let plan = plan(&resolved, &targets)?;
    println!("{}", plan.to_json()?);

    Ok(())
}
