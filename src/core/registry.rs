//! TargetRegistry - the file-scoped declaration accumulator.
//!
//! Each build file is evaluated into its own registry. Declarations are
//! validated as they arrive and kept in declaration order; the registry
//! never interprets dependency references, it only stores them.

use std::collections::HashMap;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::target::{is_valid_target_name, Target, TargetKind};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Why a declaration was rejected as invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    EmptyName,
    BadName,
    NoSources,
    EmptySource { index: usize },
    EmptyDep { index: usize },
    MissingKind,
    UnknownKind { kind: String },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::EmptyName => write!(f, "name must not be empty"),
            InvalidReason::BadName => write!(
                f,
                "name may only contain letters, digits, `_`, `-` and `.`"
            ),
            InvalidReason::NoSources => write!(f, "`srcs` must list at least one entry"),
            InvalidReason::EmptySource { index } => write!(f, "`srcs[{}]` is empty", index),
            InvalidReason::EmptyDep { index } => write!(f, "`deps[{}]` is empty", index),
            InvalidReason::MissingKind => write!(f, "`kind` is required"),
            InvalidReason::UnknownKind { kind } => {
                write!(f, "{}", crate::core::target::TargetKindParseError(kind.clone()))
            }
        }
    }
}

/// A declaration rejected by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum DeclareError {
    #[error("duplicate target `{name}`")]
    #[diagnostic(
        code(keel::declare::duplicate_target),
        help("target names must be unique within a build file")
    )]
    DuplicateTarget { name: String },

    #[error("invalid target `{name}`: {reason}")]
    #[diagnostic(code(keel::declare::invalid_target))]
    InvalidTarget { name: String, reason: InvalidReason },
}

impl DeclareError {
    /// Name of the offending target (may be empty for unnamed declarations).
    pub fn target_name(&self) -> &str {
        match self {
            DeclareError::DuplicateTarget { name } | DeclareError::InvalidTarget { name, .. } => {
                name
            }
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DeclareError::DuplicateTarget { name } => {
                Diagnostic::error(format!("target `{}` is declared more than once", name))
                    .with_suggestion(suggestions::RENAME_TARGET)
            }
            DeclareError::InvalidTarget { name, reason } => {
                let diag = Diagnostic::error(format!("invalid target `{}`", name))
                    .with_context(reason.to_string());
                match reason {
                    InvalidReason::MissingKind | InvalidReason::UnknownKind { .. } => {
                        diag.with_suggestion(suggestions::KNOWN_KINDS)
                    }
                    InvalidReason::NoSources => diag.with_suggestion(suggestions::ADD_SOURCES),
                    _ => diag,
                }
            }
        }
    }
}

/// Ordered, name-unique collection of the targets declared by one build file.
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Vec<Target>,
    by_name: HashMap<String, usize>,
}

impl TargetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a target.
    ///
    /// The declaration is validated and appended; the returned reference is
    /// the stored record.
    pub fn declare(
        &mut self,
        kind: TargetKind,
        name: impl Into<String>,
        sources: Vec<String>,
        deps: Vec<String>,
    ) -> Result<&Target, DeclareError> {
        let name = name.into();

        let invalid = |reason| DeclareError::InvalidTarget {
            name: name.clone(),
            reason,
        };

        if name.is_empty() {
            return Err(invalid(InvalidReason::EmptyName));
        }
        if !is_valid_target_name(&name) {
            return Err(invalid(InvalidReason::BadName));
        }
        if self.contains(&name) {
            return Err(DeclareError::DuplicateTarget { name: name.clone() });
        }
        if kind.requires_sources() && sources.is_empty() {
            return Err(invalid(InvalidReason::NoSources));
        }
        if let Some(index) = sources.iter().position(|s| s.trim().is_empty()) {
            return Err(invalid(InvalidReason::EmptySource { index }));
        }
        if let Some(index) = deps.iter().position(|d| d.trim().is_empty()) {
            return Err(invalid(InvalidReason::EmptyDep { index }));
        }

        tracing::trace!("declared {} target `{}`", kind, name);

        let index = self.targets.len();
        self.by_name.insert(name.clone(), index);
        self.targets.push(Target::new(kind, name, sources, deps));
        Ok(&self.targets[index])
    }

    /// Look up a target by name.
    pub fn get(&self, name: &str) -> Option<&Target> {
        self.by_name.get(name).map(|&i| &self.targets[i])
    }

    /// Check whether a target with this name has been declared.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterate over targets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    /// Target names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(|t| t.name())
    }

    /// Number of declared targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Hand off the declarations, in order.
    pub fn into_targets(self) -> Vec<Target> {
        self.targets
    }
}

impl<'a> IntoIterator for &'a TargetRegistry {
    type Item = &'a Target;
    type IntoIter = std::slice::Iter<'a, Target>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_declare_then_lookup() {
        let mut registry = TargetRegistry::new();
        registry
            .declare(
                TargetKind::Proto,
                "proto",
                strings(&["./a.proto", "./b.proto"]),
                strings(&["lib+common_proto"]),
            )
            .unwrap();

        let target = registry.get("proto").unwrap();
        assert_eq!(target.name(), "proto");
        assert_eq!(target.kind(), TargetKind::Proto);
        assert_eq!(target.sources(), ["./a.proto", "./b.proto"]);
        assert_eq!(target.deps(), ["lib+common_proto"]);
    }

    #[test]
    fn test_imagereader_scenario() {
        let mut registry = TargetRegistry::new();
        registry
            .declare(
                TargetKind::Proto,
                "proto",
                strings(&["./imagereader.proto"]),
                strings(&["lib+common_proto"]),
            )
            .unwrap();
        registry
            .declare(
                TargetKind::ProtoCc,
                "proto_lib",
                strings(&["+proto"]),
                strings(&["lib+common_proto_lib"]),
            )
            .unwrap();

        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, ["proto", "proto_lib"]);

        let targets = registry.into_targets();
        assert_eq!(targets[0].deps(), ["lib+common_proto"]);
        assert_eq!(targets[1].kind(), TargetKind::ProtoCc);
        assert_eq!(targets[1].sources(), ["+proto"]);
        assert_eq!(targets[1].deps(), ["lib+common_proto_lib"]);
    }

    #[test]
    fn test_duplicate_name() {
        let mut registry = TargetRegistry::new();
        registry
            .declare(TargetKind::Proto, "proto", strings(&["a.proto"]), vec![])
            .unwrap();

        let err = registry
            .declare(TargetKind::ProtoCc, "proto", strings(&["+proto"]), vec![])
            .unwrap_err();
        assert_eq!(
            err,
            DeclareError::DuplicateTarget {
                name: "proto".to_string()
            }
        );
        // The first declaration is untouched.
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("proto").unwrap().kind(), TargetKind::Proto);
    }

    #[test]
    fn test_schema_without_sources() {
        let mut registry = TargetRegistry::new();
        let err = registry
            .declare(TargetKind::Proto, "proto", vec![], vec![])
            .unwrap_err();
        assert!(matches!(
            err,
            DeclareError::InvalidTarget {
                reason: InvalidReason::NoSources,
                ..
            }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_names_and_entries() {
        let mut registry = TargetRegistry::new();

        let err = registry
            .declare(TargetKind::Proto, "", strings(&["a.proto"]), vec![])
            .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));

        let err = registry
            .declare(TargetKind::Proto, "lib+x", strings(&["a.proto"]), vec![])
            .unwrap_err();
        assert_eq!(err.target_name(), "lib+x");

        let err = registry
            .declare(TargetKind::Proto, "p", strings(&["a.proto", " "]), vec![])
            .unwrap_err();
        assert!(err.to_string().contains("`srcs[1]` is empty"));

        let err = registry
            .declare(TargetKind::Proto, "p", strings(&["a.proto"]), strings(&[""]))
            .unwrap_err();
        assert!(err.to_string().contains("`deps[0]` is empty"));
    }

    #[test]
    fn test_duplicate_diagnostic() {
        let err = DeclareError::DuplicateTarget {
            name: "proto".to_string(),
        };
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("`proto` is declared more than once"));
        assert!(output.contains("help: consider:"));
    }
}
