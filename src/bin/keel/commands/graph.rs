//! `keel graph` command

use std::collections::HashSet;

use anyhow::Result;

use crate::cli::GraphArgs;
use keel::ops::{resolve_workspace, select_targets};
use keel::resolver::EdgeKind;
use keel::{GlobalContext, TargetGraph, TargetLabel};

pub fn execute(args: GraphArgs, ctx: &GlobalContext) -> Result<()> {
    let resolved = resolve_workspace(ctx)?;
    let graph = &resolved.graph;

    let roots: Vec<TargetLabel> = match &args.target {
        Some(spec) => {
            let current = ctx
                .current_package(resolved.workspace.root())
                .unwrap_or_default();
            select_targets(&resolved, std::slice::from_ref(spec), &current)?
        }
        // Top of the tree: nothing uses them (or, reversed, they use nothing)
        None => graph
            .labels()
            .filter(|l| {
                if args.reverse {
                    graph.deps(l).is_empty()
                } else {
                    graph.dependents(l).is_empty()
                }
            })
            .cloned()
            .collect(),
    };

    let max_depth = args.depth.unwrap_or(usize::MAX);
    let mut seen = HashSet::new();
    for root in &roots {
        let tree = Tree {
            graph,
            max_depth,
            reverse: args.reverse,
        };
        tree.print(root, None, "", None, 0, &mut seen);
    }

    Ok(())
}

struct Tree<'a> {
    graph: &'a TargetGraph,
    max_depth: usize,
    reverse: bool,
}

impl Tree<'_> {
    /// `last` is `None` for a root, otherwise whether this is the final child.
    fn print(
        &self,
        label: &TargetLabel,
        edge: Option<EdgeKind>,
        indent: &str,
        last: Option<bool>,
        depth: usize,
        seen: &mut HashSet<TargetLabel>,
    ) {
        if depth > self.max_depth {
            return;
        }

        let is_duplicate = !seen.insert(label.clone());

        let (branch, child_indent) = match last {
            None => ("", String::new()),
            Some(true) => ("└── ", format!("{indent}    ")),
            Some(false) => ("├── ", format!("{indent}│   ")),
        };
        let kind = self.graph.kind(label).map(|k| k.as_str()).unwrap_or("?");
        let via = match edge {
            Some(EdgeKind::Source) => " [src]",
            _ => "",
        };
        let dup_marker = if is_duplicate { " (*)" } else { "" };

        println!("{}{}{} ({}){}{}", indent, branch, label, kind, via, dup_marker);

        // Don't recurse into targets already shown
        if is_duplicate || depth == self.max_depth {
            return;
        }

        let children: Vec<(TargetLabel, Option<EdgeKind>)> = if self.reverse {
            self.graph
                .dependents(label)
                .into_iter()
                .map(|l| (l, None))
                .collect()
        } else {
            self.graph
                .deps(label)
                .into_iter()
                .map(|(l, kind)| (l, Some(kind)))
                .collect()
        };

        let count = children.len();
        for (i, (child, kind)) in children.iter().enumerate() {
            self.print(child, *kind, &child_indent, Some(i + 1 == count), depth + 1, seen);
        }
    }
}
