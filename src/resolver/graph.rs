//! TargetGraph - the resolved, immutable target graph.
//!
//! Edges run from a dependent to its dependency. A graph only exists if
//! every reference in the workspace resolved and no cycle was found.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use serde::Serialize;

use crate::core::build_file::BuildFile;
use crate::core::reference::{resolve_label, TargetRef};
use crate::core::target::{Target, TargetKind, TargetLabel};
use crate::core::workspace::Workspace;
use crate::resolver::errors::{similar_names, ResolveError, Unresolved};

/// How a target uses another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Listed in `srcs` (a generated library's schema target)
    Source,
    /// Listed in `deps`
    Dep,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Source => write!(f, "source"),
            EdgeKind::Dep => write!(f, "dependency"),
        }
    }
}

#[derive(Debug, Clone)]
struct TargetNode {
    label: TargetLabel,
    kind: TargetKind,
}

/// The resolved target graph.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    graph: DiGraph<TargetNode, EdgeKind>,
    nodes: HashMap<TargetLabel, NodeIndex>,
}

impl TargetGraph {
    /// Resolve every reference in the workspace.
    pub fn resolve(ws: &Workspace) -> Result<Self, ResolveError> {
        let mut graph = TargetGraph {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        };

        for (label, target) in ws.targets() {
            let node = graph.graph.add_node(TargetNode {
                label: label.clone(),
                kind: target.kind(),
            });
            graph.nodes.insert(label, node);
        }

        for file in ws.build_files() {
            for target in file.targets() {
                graph.link_target(ws, file, target)?;
            }
        }

        graph.check_acyclic()?;

        tracing::debug!(
            "resolved {} target(s), {} edge(s)",
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        Ok(graph)
    }

    fn link_target(
        &mut self,
        ws: &Workspace,
        file: &BuildFile,
        target: &Target,
    ) -> Result<(), ResolveError> {
        let from = TargetLabel::new(file.package(), target.name());

        if target.kind().sources_are_references() {
            for src in target.sources() {
                let to = self.resolve_entry(ws, file, &from, src)?;
                self.check_kind(file, &from, &to, EdgeKind::Source, TargetKind::Proto)?;
                self.add_edge(&from, &to, EdgeKind::Source);
            }
        } else if let Some(src) = target
            .sources()
            .iter()
            .find(|s| self.names_declared_target(file, s))
        {
            return Err(ResolveError::FileExpected {
                from,
                reference: src.clone(),
                file: file.path().to_path_buf(),
            });
        }

        // deps stay within a kind: schemas import schemas, libraries link libraries
        for dep in target.deps() {
            let to = self.resolve_entry(ws, file, &from, dep)?;
            self.check_kind(file, &from, &to, EdgeKind::Dep, target.kind())?;
            self.add_edge(&from, &to, EdgeKind::Dep);
        }

        Ok(())
    }

    /// Whether a schema source is really a reference to a declared target.
    /// File names may contain `+`, so only an exact hit counts.
    fn names_declared_target(&self, file: &BuildFile, src: &str) -> bool {
        TargetRef::parse(src)
            .and_then(|r| r.to_label(file.package()))
            .is_ok_and(|label| self.nodes.contains_key(&label))
    }

    fn resolve_entry(
        &self,
        ws: &Workspace,
        file: &BuildFile,
        from: &TargetLabel,
        raw: &str,
    ) -> Result<TargetLabel, ResolveError> {
        let label = resolve_label(raw, file.package()).map_err(|source| {
            ResolveError::BadReference {
                from: from.clone(),
                reference: raw.to_string(),
                file: file.path().to_path_buf(),
                source,
            }
        })?;

        if self.nodes.contains_key(&label) {
            return Ok(label);
        }

        let reason = match ws.build_file(label.package()) {
            None => Unresolved::NoPackage,
            Some(pkg) => Unresolved::NoTarget {
                similar: similar_names(label.name(), pkg.registry().names()),
            },
        };

        Err(ResolveError::UnresolvedDependency {
            from: from.clone(),
            reference: raw.to_string(),
            resolved: label,
            file: file.path().to_path_buf(),
            reason,
        })
    }

    fn check_kind(
        &self,
        file: &BuildFile,
        from: &TargetLabel,
        to: &TargetLabel,
        role: EdgeKind,
        expected: TargetKind,
    ) -> Result<(), ResolveError> {
        let found = self.graph[self.nodes[to]].kind;
        if found == expected {
            return Ok(());
        }
        Err(ResolveError::KindMismatch {
            from: from.clone(),
            to: to.clone(),
            file: file.path().to_path_buf(),
            role,
            expected,
            found,
        })
    }

    fn add_edge(&mut self, from: &TargetLabel, to: &TargetLabel, kind: EdgeKind) {
        let (a, b) = (self.nodes[from], self.nodes[to]);
        if !self.graph.edges_connecting(a, b).any(|e| *e.weight() == kind) {
            self.graph.add_edge(a, b, kind);
        }
    }

    fn check_acyclic(&self) -> Result<(), ResolveError> {
        let cycle = match toposort(&self.graph, None) {
            Ok(_) => return Ok(()),
            Err(cycle) => cycle.node_id(),
        };

        let mut members: Vec<NodeIndex> = tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.contains(&cycle))
            .unwrap_or_else(|| vec![cycle]);
        members.sort();

        let mut targets: Vec<String> = members
            .iter()
            .map(|&n| self.graph[n].label.to_string())
            .collect();
        if let Some(first) = targets.first().cloned() {
            targets.push(first);
        }

        Err(ResolveError::CycleDetected { targets })
    }

    /// Number of targets in the graph.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph has no targets.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Check if a label is in the graph.
    pub fn contains(&self, label: &TargetLabel) -> bool {
        self.nodes.contains_key(label)
    }

    /// Kind of a target in the graph.
    pub fn kind(&self, label: &TargetLabel) -> Option<TargetKind> {
        self.nodes.get(label).map(|&n| self.graph[n].kind)
    }

    /// All labels in workspace declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &TargetLabel> {
        self.graph.node_weights().map(|n| &n.label)
    }

    /// Direct dependencies of a target, in the order they were written.
    pub fn deps(&self, label: &TargetLabel) -> Vec<(TargetLabel, EdgeKind)> {
        let Some(&node) = self.nodes.get(label) else {
            return Vec::new();
        };
        // petgraph yields the most recently added edge first
        let mut deps: Vec<_> = self
            .graph
            .edges(node)
            .map(|e| (self.graph[e.target()].label.clone(), *e.weight()))
            .collect();
        deps.reverse();
        deps
    }

    /// Direct dependencies reached through one kind of edge.
    pub fn deps_of_kind(&self, label: &TargetLabel, kind: EdgeKind) -> Vec<TargetLabel> {
        self.deps(label)
            .into_iter()
            .filter(|(_, k)| *k == kind)
            .map(|(l, _)| l)
            .collect()
    }

    /// Targets that use the given target, in declaration order.
    pub fn dependents(&self, label: &TargetLabel) -> Vec<TargetLabel> {
        let Some(&node) = self.nodes.get(label) else {
            return Vec::new();
        };
        let mut nodes: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        nodes.sort();
        nodes.into_iter().map(|n| self.graph[n].label.clone()).collect()
    }

    /// Every target, dependencies before dependents.
    ///
    /// Ties are broken by declaration order, so the result is stable for a
    /// given workspace.
    pub fn topological_order(&self) -> Vec<TargetLabel> {
        self.post_order(self.graph.node_indices())
    }

    /// The given targets and everything they depend on, dependencies first.
    ///
    /// Unknown labels are ignored.
    pub fn closure<'a>(&self, roots: impl IntoIterator<Item = &'a TargetLabel>) -> Vec<TargetLabel> {
        let starts: Vec<NodeIndex> = roots
            .into_iter()
            .filter_map(|l| self.nodes.get(l).copied())
            .collect();
        self.post_order(starts)
    }

    /// Everything a target depends on, directly or not, dependencies first.
    pub fn transitive_deps(&self, label: &TargetLabel) -> Vec<TargetLabel> {
        let mut order = self.closure([label]);
        order.retain(|l| l != label);
        order
    }

    fn post_order(&self, starts: impl IntoIterator<Item = NodeIndex>) -> Vec<TargetLabel> {
        let mut order = Vec::new();
        let mut dfs = DfsPostOrder::empty(&self.graph);

        for start in starts {
            if dfs.discovered.contains(start.index()) {
                continue;
            }
            dfs.move_to(start);
            while let Some(node) = dfs.next(&self.graph) {
                order.push(self.graph[node].label.clone());
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(package: &str, content: &str) -> BuildFile {
        let path = PathBuf::from("/ws").join(package).join("Keel.toml");
        BuildFile::evaluate(content, &path, package).unwrap()
    }

    fn workspace(files: Vec<BuildFile>) -> Workspace {
        Workspace::from_build_files(PathBuf::from("/ws"), PathBuf::from("/ws/.keel/out"), files)
    }

    fn imagereader() -> Workspace {
        workspace(vec![
            file("", "[workspace]\n"),
            file(
                "lib",
                r#"
[[target]]
kind = "proto"
name = "common_proto"
srcs = ["common.proto"]

[[target]]
kind = "protocc"
name = "common_proto_lib"
srcs = ["+common_proto"]
"#,
            ),
            file(
                "lib/imagereader",
                r#"
[[target]]
kind = "proto"
name = "proto"
srcs = ["./imagereader.proto"]
deps = ["lib+common_proto"]

[[target]]
kind = "protocc"
name = "proto_lib"
srcs = ["+proto"]
deps = ["lib+common_proto_lib"]
"#,
            ),
        ])
    }

    fn label(s: &str) -> TargetLabel {
        let (package, name) = s.rsplit_once('+').unwrap();
        TargetLabel::new(package, name)
    }

    #[test]
    fn test_resolve_imagereader() {
        let graph = TargetGraph::resolve(&imagereader()).unwrap();
        assert_eq!(graph.len(), 4);

        assert_eq!(
            graph.deps(&label("lib/imagereader+proto_lib")),
            vec![
                (label("lib/imagereader+proto"), EdgeKind::Source),
                (label("lib+common_proto_lib"), EdgeKind::Dep),
            ]
        );
        assert_eq!(
            graph.deps_of_kind(&label("lib/imagereader+proto"), EdgeKind::Dep),
            vec![label("lib+common_proto")]
        );
        assert_eq!(
            graph.dependents(&label("lib+common_proto")),
            vec![label("lib+common_proto_lib"), label("lib/imagereader+proto")]
        );
    }

    #[test]
    fn test_topological_order() {
        let graph = TargetGraph::resolve(&imagereader()).unwrap();
        let order: Vec<String> = graph
            .topological_order()
            .iter()
            .map(|l| l.to_string())
            .collect();

        let pos = |s: &str| order.iter().position(|l| l == s).unwrap();
        assert_eq!(order.len(), 4);
        assert!(pos("lib+common_proto") < pos("lib+common_proto_lib"));
        assert!(pos("lib+common_proto") < pos("lib/imagereader+proto"));
        assert!(pos("lib/imagereader+proto") < pos("lib/imagereader+proto_lib"));
        assert!(pos("lib+common_proto_lib") < pos("lib/imagereader+proto_lib"));
    }

    #[test]
    fn test_closure_and_transitive_deps() {
        let graph = TargetGraph::resolve(&imagereader()).unwrap();

        let deps = graph.transitive_deps(&label("lib/imagereader+proto"));
        assert_eq!(deps, vec![label("lib+common_proto")]);

        let closure = graph.closure([&label("lib+common_proto_lib")]);
        assert_eq!(
            closure,
            vec![label("lib+common_proto"), label("lib+common_proto_lib")]
        );

        assert!(graph.closure([&label("nope+x")]).is_empty());
    }

    #[test]
    fn test_unresolved_target() {
        let ws = workspace(vec![
            file("", "[workspace]\n"),
            file(
                "lib",
                "[[target]]\nkind = \"proto\"\nname = \"common_proto\"\nsrcs = [\"c.proto\"]\n",
            ),
            file(
                "app",
                "[[target]]\nkind = \"proto\"\nname = \"p\"\nsrcs = [\"p.proto\"]\ndeps = [\"lib+common\"]\n",
            ),
        ]);

        let err = TargetGraph::resolve(&ws).unwrap_err();
        match err {
            ResolveError::UnresolvedDependency {
                from,
                reference,
                reason,
                ..
            } => {
                assert_eq!(from, label("app+p"));
                assert_eq!(reference, "lib+common");
                assert_eq!(
                    reason,
                    Unresolved::NoTarget {
                        similar: vec!["common_proto".to_string()]
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unresolved_package() {
        let ws = workspace(vec![file(
            "",
            "[[target]]\nkind = \"protocc\"\nname = \"lib\"\nsrcs = [\"missing+proto\"]\n",
        )]);

        let err = TargetGraph::resolve(&ws).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnresolvedDependency {
                reason: Unresolved::NoPackage,
                ..
            }
        ));
    }

    #[test]
    fn test_plain_dep_name_is_local() {
        let ws = workspace(vec![file(
            "",
            r#"
[[target]]
kind = "proto"
name = "base"
srcs = ["base.proto"]

[[target]]
kind = "proto"
name = "derived"
srcs = ["derived.proto"]
deps = ["base"]
"#,
        )]);

        let graph = TargetGraph::resolve(&ws).unwrap();
        assert_eq!(graph.transitive_deps(&label("+derived")), vec![label("+base")]);
    }

    #[test]
    fn test_kind_mismatch() {
        let ws = workspace(vec![file(
            "",
            r#"
[[target]]
kind = "proto"
name = "proto"
srcs = ["a.proto"]

[[target]]
kind = "protocc"
name = "lib"
srcs = ["+proto"]

[[target]]
kind = "protocc"
name = "bad"
srcs = ["+lib"]
"#,
        )]);

        let err = TargetGraph::resolve(&ws).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::KindMismatch {
                role: EdgeKind::Source,
                expected: TargetKind::Proto,
                found: TargetKind::ProtoCc,
                ..
            }
        ));
    }

    #[test]
    fn test_reference_in_proto_sources() {
        let ws = workspace(vec![file(
            "",
            "[[target]]\nkind = \"proto\"\nname = \"p\"\nsrcs = [\"+q\"]\n\n\
             [[target]]\nkind = \"proto\"\nname = \"q\"\nsrcs = [\"q.proto\"]\n",
        )]);

        let err = TargetGraph::resolve(&ws).unwrap_err();
        assert!(matches!(err, ResolveError::FileExpected { .. }));
    }

    #[test]
    fn test_plus_in_schema_file_name() {
        let ws = workspace(vec![file(
            "",
            "[[target]]\nkind = \"proto\"\nname = \"p\"\nsrcs = [\"c++_types.proto\", \"+q.proto\"]\n",
        )]);

        let graph = TargetGraph::resolve(&ws).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.deps(&TargetLabel::new("", "p")).is_empty());
    }

    #[test]
    fn test_cycle_detected() {
        let ws = workspace(vec![file(
            "",
            r#"
[[target]]
kind = "proto"
name = "a"
srcs = ["a.proto"]
deps = ["+b"]

[[target]]
kind = "proto"
name = "b"
srcs = ["b.proto"]
deps = ["+a"]
"#,
        )]);

        let err = TargetGraph::resolve(&ws).unwrap_err();
        match err {
            ResolveError::CycleDetected { targets } => {
                assert_eq!(targets, ["+a", "+b", "+a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let ws = workspace(vec![file(
            "",
            "[[target]]\nkind = \"proto\"\nname = \"a\"\nsrcs = [\"a.proto\"]\ndeps = [\"+a\"]\n",
        )]);

        assert!(matches!(
            TargetGraph::resolve(&ws),
            Err(ResolveError::CycleDetected { .. })
        ));
    }
}
