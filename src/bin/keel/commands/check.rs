//! `keel check` command

use anyhow::Result;

use crate::cli::CheckArgs;
use keel::ops::resolve_workspace;
use keel::GlobalContext;

pub fn execute(_args: CheckArgs, ctx: &GlobalContext) -> Result<()> {
    let resolved = resolve_workspace(ctx)?;

    println!(
        "    Checked {} target(s) in {} package(s)",
        resolved.graph.len(),
        resolved.workspace.build_files().len()
    );

    Ok(())
}
