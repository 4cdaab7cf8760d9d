//! `keel targets` command

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::cli::TargetsArgs;
use keel::core::reference::normalize_package;
use keel::ops::resolve_workspace;
use keel::{GlobalContext, TargetKind};

#[derive(Serialize)]
struct TargetEntry<'a> {
    label: String,
    package: String,
    name: &'a str,
    kind: TargetKind,
    srcs: &'a [String],
    deps: &'a [String],
}

pub fn execute(args: TargetsArgs, ctx: &GlobalContext) -> Result<()> {
    let resolved = resolve_workspace(ctx)?;
    let ws = &resolved.workspace;

    let package = match args.package.as_deref() {
        None => None,
        Some(".") => Some(ctx.current_package(ws.root()).unwrap_or_default()),
        Some(p) => Some(normalize_package(p).ok_or_else(|| anyhow!("invalid package `{}`", p))?),
    };

    if let Some(package) = &package {
        if ws.build_file(package).is_none() {
            return Err(anyhow!(
                "package `{}` not found in workspace\n\
                 available packages: {}",
                package,
                ws.packages()
                    .map(|p| if p.is_empty() { "(root)" } else { p })
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }

    let entries: Vec<TargetEntry> = ws
        .targets()
        .filter(|(label, _)| package.as_deref().map_or(true, |p| label.package() == p))
        .map(|(label, target)| TargetEntry {
            label: label.to_string(),
            package: label.package().to_string(),
            name: target.name(),
            kind: target.kind(),
            srcs: target.sources(),
            deps: target.deps(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let width = entries.iter().map(|e| e.label.len()).max().unwrap_or(0);
    for entry in &entries {
        println!("{:<width$}  {}", entry.label, entry.kind, width = width);
    }

    Ok(())
}
