//! Target definitions - what gets built.
//!
//! A Target is a named unit of build work declared in a build file:
//! either a protobuf schema compilation or a library generated from
//! compiled schemas.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Target names: alphanumerics, `_`, `-` and `.`, not starting with `.` or `-`.
static TARGET_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").unwrap());

/// The kind of target being declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Schema-definition target: `.proto` sources compiled to a descriptor set
    #[serde(alias = "schema")]
    Proto,

    /// Generated-library target: C++ generated from schema-definition targets
    #[serde(alias = "library", alias = "proto_lib")]
    ProtoCc,
}

impl TargetKind {
    /// All recognised kinds, in documentation order.
    pub const ALL: [TargetKind; 2] = [TargetKind::Proto, TargetKind::ProtoCc];

    /// The keyword used in build files.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Proto => "proto",
            TargetKind::ProtoCc => "protocc",
        }
    }

    /// Human-readable description of the kind.
    pub fn description(&self) -> &'static str {
        match self {
            TargetKind::Proto => "schema-definition",
            TargetKind::ProtoCc => "generated-library",
        }
    }

    /// Whether a declaration of this kind must list at least one source.
    pub fn requires_sources(&self) -> bool {
        match self {
            TargetKind::Proto | TargetKind::ProtoCc => true,
        }
    }

    /// Whether this kind's sources are target references rather than files.
    pub fn sources_are_references(&self) -> bool {
        matches!(self, TargetKind::ProtoCc)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetKind {
    type Err = TargetKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proto" | "schema" => Ok(TargetKind::Proto),
            "protocc" | "library" | "proto_lib" => Ok(TargetKind::ProtoCc),
            _ => Err(TargetKindParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognised target kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetKindParseError(pub String);

impl fmt::Display for TargetKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<_> = TargetKind::ALL.iter().map(|k| k.as_str()).collect();
        write!(
            f,
            "unknown target kind `{}` (expected one of: {})",
            self.0,
            valid.join(", ")
        )
    }
}

impl std::error::Error for TargetKindParseError {}

/// Check whether a string is a valid target name.
pub fn is_valid_target_name(name: &str) -> bool {
    TARGET_NAME.is_match(name)
}

/// A declared build target.
///
/// Targets are immutable once declared; the registry is the only place
/// that constructs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    name: String,
    kind: TargetKind,
    #[serde(rename = "srcs")]
    sources: Vec<String>,
    deps: Vec<String>,
}

impl Target {
    pub(crate) fn new(
        kind: TargetKind,
        name: String,
        sources: Vec<String>,
        deps: Vec<String>,
    ) -> Self {
        Target {
            name,
            kind,
            sources,
            deps,
        }
    }

    /// Target name, unique within its build file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What kind of target this is.
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Sources in declaration order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Dependency references in declaration order, uninterpreted.
    pub fn deps(&self) -> &[String] {
        &self.deps
    }
}

/// Workspace-wide identity of a target: the package (build file directory
/// relative to the workspace root) plus the target name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetLabel {
    package: String,
    name: String,
}

impl TargetLabel {
    /// Create a label. The root package is the empty string.
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        TargetLabel {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Package path, `/`-separated, empty for the root package.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Target name within the package.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TargetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.package, self.name)
    }
}
