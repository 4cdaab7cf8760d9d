//! Resolution error types and diagnostics.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::reference::ReferenceError;
use crate::core::target::{TargetKind, TargetLabel};
use crate::resolver::graph::EdgeKind;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Why a reference did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// No build file exists for the referenced package.
    NoPackage,
    /// The package exists but declares no such target.
    NoTarget { similar: Vec<String> },
}

/// Error while resolving references into the target graph.
///
/// Like load errors, these are fatal: the graph is either fully resolved
/// or not built at all.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ResolveError {
    #[error("unresolved dependency `{reference}` of `{from}`")]
    #[diagnostic(code(keel::resolve::unresolved))]
    UnresolvedDependency {
        from: TargetLabel,
        reference: String,
        resolved: TargetLabel,
        file: PathBuf,
        reason: Unresolved,
    },

    #[error("invalid reference `{reference}` in `{from}`")]
    #[diagnostic(code(keel::resolve::bad_reference))]
    BadReference {
        from: TargetLabel,
        reference: String,
        file: PathBuf,
        #[source]
        source: ReferenceError,
    },

    #[error("`{from}` expects a {expected} target as {role}, but `{to}` is {found}")]
    #[diagnostic(code(keel::resolve::kind_mismatch))]
    KindMismatch {
        from: TargetLabel,
        to: TargetLabel,
        file: PathBuf,
        role: EdgeKind,
        expected: TargetKind,
        found: TargetKind,
    },

    #[error("`{from}` lists target reference `{reference}` as a schema file")]
    #[diagnostic(
        code(keel::resolve::file_expected),
        help("proto targets take .proto files in `srcs`; put other proto targets in `deps`")
    )]
    FileExpected {
        from: TargetLabel,
        reference: String,
        file: PathBuf,
    },

    #[error("cycle detected in target graph")]
    #[diagnostic(code(keel::resolve::cycle))]
    CycleDetected { targets: Vec<String> },
}

impl ResolveError {
    /// The build file the error was found in, if it belongs to one.
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            ResolveError::UnresolvedDependency { file, .. }
            | ResolveError::BadReference { file, .. }
            | ResolveError::KindMismatch { file, .. }
            | ResolveError::FileExpected { file, .. } => Some(file),
            ResolveError::CycleDetected { .. } => None,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = match self {
            ResolveError::UnresolvedDependency {
                from,
                reference,
                resolved,
                reason,
                ..
            } => {
                let mut diag = Diagnostic::error(format!(
                    "unresolved dependency `{}`",
                    reference
                ))
                .with_context(format!("required by `{}`", from));

                match reason {
                    Unresolved::NoPackage => {
                        let package = if resolved.package().is_empty() {
                            "the workspace root".to_string()
                        } else {
                            format!("`{}`", resolved.package())
                        };
                        diag = diag
                            .with_context(format!("no build file found in {}", package))
                            .with_suggestion(format!(
                                "Create {}/Keel.toml declaring `{}`",
                                if resolved.package().is_empty() { "." } else { resolved.package() },
                                resolved.name()
                            ));
                    }
                    Unresolved::NoTarget { similar } => {
                        diag = diag.with_context(format!(
                            "package `{}` declares no target `{}`",
                            resolved.package(),
                            resolved.name()
                        ));
                        if !similar.is_empty() {
                            diag = diag.with_context(format!(
                                "did you mean: {}?",
                                similar.join(", ")
                            ));
                        }
                    }
                }

                diag.with_suggestion(suggestions::UNRESOLVED)
            }

            ResolveError::BadReference {
                from,
                reference,
                source,
                ..
            } => Diagnostic::error(format!("invalid reference `{}`", reference))
                .with_context(format!("in `{}`", from))
                .with_context(source.to_string())
                .with_suggestion("Write references as `package+name` or `+name`"),

            ResolveError::KindMismatch {
                from,
                to,
                role,
                expected,
                found,
                ..
            } => Diagnostic::error(format!(
                "`{}` cannot use `{}` as {}",
                from, to, role
            ))
            .with_context(format!(
                "expected a {} ({}) target, found {} ({})",
                expected,
                expected.description(),
                found,
                found.description()
            ))
            .with_suggestion(format!("Reference a `{}` target instead", expected)),

            ResolveError::FileExpected {
                from, reference, ..
            } => Diagnostic::error(format!(
                "`{}` lists `{}` in `srcs`",
                from, reference
            ))
            .with_context("proto sources must be schema files")
            .with_suggestion(format!("Move `{}` to `deps`", reference)),

            ResolveError::CycleDetected { targets } => {
                Diagnostic::error("cycle detected in target graph")
                    .with_context(format!("cycle: {}", targets.join(" -> ")))
                    .with_suggestion("Break the cycle by removing one of the references")
            }
        };

        match self.file() {
            Some(file) => diag.with_location(file),
            None => diag,
        }
    }
}

/// Names from `candidates` that look like a misspelling of `wanted`.
pub(crate) fn similar_names<'a>(
    wanted: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let wanted_lower = wanted.to_lowercase();
    candidates
        .into_iter()
        .filter(|c| {
            let c = c.to_lowercase();
            c.contains(&wanted_lower) || wanted_lower.contains(&c)
        })
        .map(|c| c.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_diagnostic() {
        let err = ResolveError::UnresolvedDependency {
            from: TargetLabel::new("lib/imagereader", "proto"),
            reference: "lib+common_proto".to_string(),
            resolved: TargetLabel::new("lib", "common_proto"),
            file: PathBuf::from("lib/imagereader/Keel.toml"),
            reason: Unresolved::NoTarget {
                similar: vec!["common_proto_lib".to_string()],
            },
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("unresolved dependency `lib+common_proto`"));
        assert!(output.contains("--> lib/imagereader/Keel.toml"));
        assert!(output.contains("required by `lib/imagereader+proto`"));
        assert!(output.contains("did you mean: common_proto_lib?"));
    }

    #[test]
    fn test_missing_package_diagnostic() {
        let err = ResolveError::UnresolvedDependency {
            from: TargetLabel::new("", "proto"),
            reference: "lib+common_proto".to_string(),
            resolved: TargetLabel::new("lib", "common_proto"),
            file: PathBuf::from("Keel.toml"),
            reason: Unresolved::NoPackage,
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("no build file found in `lib`"));
        assert!(output.contains("Create lib/Keel.toml declaring `common_proto`"));
    }

    #[test]
    fn test_cycle_diagnostic() {
        let err = ResolveError::CycleDetected {
            targets: vec!["+a".to_string(), "+b".to_string(), "+a".to_string()],
        };
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("cycle: +a -> +b -> +a"));
        assert!(err.file().is_none());
    }

    #[test]
    fn test_similar_names() {
        let names = ["common_proto", "common_proto_lib", "imagereader"];
        assert_eq!(
            similar_names("common", names),
            ["common_proto", "common_proto_lib"]
        );
        assert!(similar_names("zzz", names).is_empty());
    }
}
