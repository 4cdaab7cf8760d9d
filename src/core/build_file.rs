//! Keel.toml build files.
//!
//! A build file is evaluated into its own [`TargetRegistry`]; nothing is
//! shared between files, so independent files can be evaluated in any
//! order or in parallel. Supports both `Keel.toml` (canonical) and
//! `keel.toml` (alias).

use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::core::registry::{DeclareError, InvalidReason, TargetRegistry};
use crate::core::target::{Target, TargetKind};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Canonical build file name.
pub const BUILD_FILE_NAME: &str = "Keel.toml";

/// Accepted alias for the build file name.
pub const BUILD_FILE_ALIAS: &str = "keel.toml";

/// Error loading or evaluating a build file. Always fatal to loading.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum LoadError {
    #[error("could not find Keel.toml in {}", dir.display())]
    #[diagnostic(code(keel::load::not_found))]
    NotFound { dir: PathBuf },

    #[error("both {} and {} exist", primary.display(), alias.display())]
    #[diagnostic(
        code(keel::load::ambiguous),
        help("remove one of the two build files")
    )]
    Ambiguous { primary: PathBuf, alias: PathBuf },

    #[error("failed to read {}", path.display())]
    #[diagnostic(code(keel::load::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    #[diagnostic(code(keel::load::parse))]
    Parse {
        path: PathBuf,
        /// 1-based line and column of the syntax error, when known.
        position: Option<(usize, usize)>,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}: {source}", path.display())]
    #[diagnostic(code(keel::load::declare))]
    Declare {
        path: PathBuf,
        #[source]
        source: DeclareError,
    },
}

impl LoadError {
    /// Wrap a TOML error, keeping the line and column it points at.
    pub fn parse(path: &Path, content: &str, source: toml::de::Error) -> Self {
        let position = source
            .span()
            .map(|span| line_column(content, span.start));
        LoadError::Parse {
            path: path.to_path_buf(),
            position,
            source,
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LoadError::NotFound { dir } => {
                Diagnostic::error(format!("no {} found", BUILD_FILE_NAME))
                    .with_location(dir)
                    .with_suggestion(suggestions::NO_WORKSPACE)
            }
            LoadError::Ambiguous { primary, alias } => Diagnostic::error("ambiguous build file")
                .with_context(format!("found {}", primary.display()))
                .with_context(format!("found {}", alias.display()))
                .with_suggestion(format!("Remove {}", alias.display())),
            LoadError::Io { path, source } => {
                Diagnostic::error(format!("could not read build file: {}", source))
                    .with_location(path)
            }
            LoadError::Parse {
                path,
                position,
                source,
            } => {
                let diag = Diagnostic::error("build file is not valid TOML").with_location(path);
                let diag = match position {
                    Some((line, column)) => diag.with_position(*line, *column),
                    None => diag,
                };
                diag.with_context(source.message().trim_end().to_string())
            }
            LoadError::Declare { path, source } => source.to_diagnostic().with_location(path),
        }
    }
}

/// The `[workspace]` table. Only honoured in the root build file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSection {
    /// Glob patterns (relative to the root) of directories to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBuildFile {
    #[serde(default)]
    workspace: Option<WorkspaceSection>,

    #[serde(default)]
    target: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTarget {
    kind: Option<String>,

    #[serde(default)]
    name: String,

    #[serde(default, alias = "sources")]
    srcs: Vec<String>,

    #[serde(default)]
    deps: Vec<String>,
}

/// An evaluated build file.
#[derive(Debug, Clone)]
pub struct BuildFile {
    package: String,
    path: PathBuf,
    workspace: Option<WorkspaceSection>,
    registry: TargetRegistry,
}

impl BuildFile {
    /// Read and evaluate a build file.
    pub fn load(path: &Path, package: impl Into<String>) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::evaluate(&content, path, package)
    }

    /// Evaluate build file content.
    ///
    /// Each `[[target]]` entry is declared, in file order, on a fresh
    /// registry. The first rejected declaration aborts evaluation.
    pub fn evaluate(
        content: &str,
        path: &Path,
        package: impl Into<String>,
    ) -> Result<Self, LoadError> {
        let raw: RawBuildFile =
            toml::from_str(content).map_err(|source| LoadError::parse(path, content, source))?;

        let declare_err = |source| LoadError::Declare {
            path: path.to_path_buf(),
            source,
        };

        let mut registry = TargetRegistry::new();
        for entry in raw.target {
            let kind = parse_kind(&entry).map_err(declare_err)?;
            registry
                .declare(kind, entry.name, entry.srcs, entry.deps)
                .map_err(declare_err)?;
        }

        let package = package.into();
        tracing::debug!(
            "evaluated {} ({} target(s)) as package `{}`",
            path.display(),
            registry.len(),
            package
        );

        Ok(BuildFile {
            package,
            path: path.to_path_buf(),
            workspace: raw.workspace,
            registry,
        })
    }

    /// Package path relative to the workspace root (empty for the root).
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Path of the build file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the build file; sources resolve against it.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// The `[workspace]` table, if present.
    pub fn workspace(&self) -> Option<&WorkspaceSection> {
        self.workspace.as_ref()
    }

    /// The evaluated declarations.
    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Look up a target declared in this file.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.registry.get(name)
    }

    /// Targets in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.registry.iter()
    }
}

fn parse_kind(entry: &RawTarget) -> Result<TargetKind, DeclareError> {
    let invalid = |reason| DeclareError::InvalidTarget {
        name: entry.name.clone(),
        reason,
    };
    match entry.kind.as_deref() {
        None => Err(invalid(InvalidReason::MissingKind)),
        Some(kind) => kind.parse().map_err(|_| {
            invalid(InvalidReason::UnknownKind {
                kind: kind.to_string(),
            })
        }),
    }
}

/// Find the build file in a directory.
pub fn find_build_file(dir: &Path) -> Result<PathBuf, LoadError> {
    let primary = dir.join(BUILD_FILE_NAME);
    let alias = dir.join(BUILD_FILE_ALIAS);

    let has_primary = primary.is_file();
    let has_alias = alias.is_file();

    // On case-insensitive filesystems both names hit the same file.
    if has_primary && has_alias && !same_file(&primary, &alias) {
        return Err(LoadError::Ambiguous { primary, alias });
    }

    if has_primary {
        Ok(primary)
    } else if has_alias {
        Ok(alias)
    } else {
        Err(LoadError::NotFound {
            dir: dir.to_path_buf(),
        })
    }
}

/// 1-based line and column of a byte offset.
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let mut end = offset.min(content.len());
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    let before = &content[..end];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const IMAGEREADER: &str = r#"
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
"#;

    #[test]
    fn test_evaluate_in_order() {
        let path = Path::new("lib/imagereader/Keel.toml");
        let file = BuildFile::evaluate(IMAGEREADER, path, "lib/imagereader").unwrap();

        assert_eq!(file.package(), "lib/imagereader");
        assert_eq!(file.dir(), Path::new("lib/imagereader"));
        assert!(file.workspace().is_none());

        let targets: Vec<_> = file.targets().collect();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name(), "proto");
        assert_eq!(targets[0].kind(), TargetKind::Proto);
        assert_eq!(targets[0].sources(), ["./imagereader.proto"]);
        assert_eq!(targets[0].deps(), ["lib+common_proto"]);
        assert_eq!(targets[1].name(), "proto_lib");
        assert_eq!(targets[1].kind(), TargetKind::ProtoCc);
        assert_eq!(targets[1].sources(), ["+proto"]);
        assert_eq!(targets[1].deps(), ["lib+common_proto_lib"]);
    }

    #[test]
    fn test_evaluate_duplicate_reports_file() {
        let content = r#"
[[target]]
kind = "proto"
name = "proto"
srcs = ["a.proto"]

[[target]]
kind = "schema"
name = "proto"
sources = ["b.proto"]
"#;
        let path = Path::new("pkg/Keel.toml");
        let err = BuildFile::evaluate(content, path, "pkg").unwrap_err();
        match &err {
            LoadError::Declare { path, source } => {
                assert_eq!(path, Path::new("pkg/Keel.toml"));
                assert!(matches!(source, DeclareError::DuplicateTarget { name } if name == "proto"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("pkg/Keel.toml"));
        assert!(message.contains("proto"));
    }

    #[test]
    fn test_evaluate_rejects_unknown_kind() {
        let content = r#"
[[target]]
kind = "cxxlibrary"
name = "lib"
srcs = ["a.cc"]
"#;
        let err = BuildFile::evaluate(content, Path::new("Keel.toml"), "").unwrap_err();
        assert!(matches!(
            err,
            LoadError::Declare {
                source: DeclareError::InvalidTarget {
                    reason: InvalidReason::UnknownKind { .. },
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn test_evaluate_rejects_missing_sources() {
        let content = r#"
[[target]]
kind = "proto"
name = "proto"
"#;
        let err = BuildFile::evaluate(content, Path::new("Keel.toml"), "").unwrap_err();
        let diag = err.to_diagnostic().format(false);
        assert!(diag.contains("invalid target `proto`"));
        assert!(diag.contains("Keel.toml"));
    }

    #[test]
    fn test_evaluate_rejects_unknown_fields() {
        let content = r#"
[[target]]
kind = "proto"
name = "proto"
srcs = ["a.proto"]
dependencies = ["x+y"]
"#;
        let err = BuildFile::evaluate(content, Path::new("Keel.toml"), "").unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let content = "[[target]]\nkind = \"proto\"\nname = \"proto\"\nsrcs = [\"a.proto\"\n";
        let err = BuildFile::evaluate(content, Path::new("lib/Keel.toml"), "lib").unwrap_err();
        match &err {
            LoadError::Parse { position, .. } => {
                let (line, _) = position.expect("toml errors carry a span");
                assert!(line >= 4, "line {line}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("--> lib/Keel.toml:"), "{output}");
        assert!(!output.contains("--> lib/Keel.toml\n"), "{output}");
    }

    #[test]
    fn test_line_column() {
        let content = "a = 1\nb = [\n";
        assert_eq!(line_column(content, 0), (1, 1));
        assert_eq!(line_column(content, 6), (2, 1));
        assert_eq!(line_column(content, 10), (2, 5));
        assert_eq!(line_column(content, 100), (3, 1));
    }

    #[test]
    fn test_workspace_section() {
        let content = r#"
[workspace]
exclude = ["third_party/**"]
"#;
        let file = BuildFile::evaluate(content, Path::new("Keel.toml"), "").unwrap();
        assert_eq!(file.workspace().unwrap().exclude, ["third_party/**"]);
        assert!(file.registry().is_empty());
    }

    #[test]
    fn test_files_are_isolated() {
        let a = BuildFile::evaluate(IMAGEREADER, Path::new("a/Keel.toml"), "a").unwrap();
        let b = BuildFile::evaluate(IMAGEREADER, Path::new("b/Keel.toml"), "b").unwrap();
        assert_eq!(a.registry().len(), 2);
        assert_eq!(b.registry().len(), 2);
    }

    #[test]
    fn test_find_build_file() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            find_build_file(tmp.path()),
            Err(LoadError::NotFound { .. })
        ));

        let alias = tmp.path().join(BUILD_FILE_ALIAS);
        std::fs::write(&alias, "").unwrap();
        let found = find_build_file(tmp.path()).unwrap();
        assert!(found.ends_with(BUILD_FILE_ALIAS) || found.ends_with(BUILD_FILE_NAME));
    }

    #[test]
    fn test_load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(BUILD_FILE_NAME);
        std::fs::write(&path, IMAGEREADER).unwrap();

        let file = BuildFile::load(&path, "").unwrap();
        assert_eq!(file.registry().len(), 2);
        assert_eq!(file.dir(), tmp.path());
    }
}
