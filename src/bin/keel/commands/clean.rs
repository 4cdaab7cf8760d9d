//! `keel clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use keel::ops::clean;
use keel::GlobalContext;

pub fn execute(_args: CleanArgs, ctx: &GlobalContext) -> Result<()> {
    let out_dir = clean(ctx)?;
    eprintln!("     Removed {}", out_dir.display());
    Ok(())
}
