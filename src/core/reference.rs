//! Target references - the `package+name` convention.
//!
//! Build files refer to other targets with strings of the form
//! `package+name`. The registry stores these verbatim; only resolution
//! turns them into [`TargetLabel`]s.
//!
//! - `+name` / `.+name`: target in the same build file
//! - `./sub+name`: target in a package below the current one
//! - `lib+name`: target in `lib/`, relative to the workspace root

use std::fmt;

use thiserror::Error;

use crate::core::target::TargetLabel;

/// Separator between the package part and the target name.
pub const REF_SEPARATOR: char = '+';

/// Error interpreting a reference string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("`{0}` is not a target reference (expected `package+name`)")]
    NotAReference(String),

    #[error("reference `{0}` has no target name after `+`")]
    MissingName(String),

    #[error("reference `{0}` escapes the workspace root")]
    EscapesRoot(String),
}

/// Where the package part of a reference is anchored.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Anchor {
    /// Same build file
    Current,
    /// Below the current package (`./sub`)
    Relative(String),
    /// Relative to the workspace root
    Root(String),
}

/// A parsed, not yet anchored, target reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRef {
    raw: String,
    anchor: Anchor,
    name: String,
}

/// Check whether a source or dependency string is a target reference.
pub fn is_reference(s: &str) -> bool {
    s.contains(REF_SEPARATOR)
}

impl TargetRef {
    /// Parse a reference string.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let (package, name) = raw
            .rsplit_once(REF_SEPARATOR)
            .ok_or_else(|| ReferenceError::NotAReference(raw.to_string()))?;

        if name.is_empty() {
            return Err(ReferenceError::MissingName(raw.to_string()));
        }

        let anchor = match package {
            "" | "." => Anchor::Current,
            p if p.starts_with("./") => Anchor::Relative(p[2..].to_string()),
            p => Anchor::Root(p.to_string()),
        };

        Ok(TargetRef {
            raw: raw.to_string(),
            anchor,
            name: name.to_string(),
        })
    }

    /// The target name part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this reference points into the same build file.
    pub fn is_local(&self) -> bool {
        matches!(self.anchor, Anchor::Current)
    }

    /// Anchor the reference, producing a workspace-wide label.
    pub fn to_label(&self, current_package: &str) -> Result<TargetLabel, ReferenceError> {
        let package = match &self.anchor {
            Anchor::Current => current_package.to_string(),
            Anchor::Relative(sub) => normalize_package(&join_package(current_package, sub))
                .ok_or_else(|| ReferenceError::EscapesRoot(self.raw.clone()))?,
            Anchor::Root(p) => normalize_package(p)
                .ok_or_else(|| ReferenceError::EscapesRoot(self.raw.clone()))?,
        };
        Ok(TargetLabel::new(package, self.name.clone()))
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolve a dependency or source entry to a label.
///
/// Entries without `+` are plain names of targets in the same build file.
pub fn resolve_label(raw: &str, current_package: &str) -> Result<TargetLabel, ReferenceError> {
    if is_reference(raw) {
        TargetRef::parse(raw)?.to_label(current_package)
    } else {
        Ok(TargetLabel::new(current_package, raw.trim()))
    }
}

fn join_package(base: &str, sub: &str) -> String {
    if base.is_empty() {
        sub.to_string()
    } else {
        format!("{}/{}", base, sub)
    }
}

/// Normalise a `/`-separated package path. Returns `None` if `..` climbs
/// above the root.
pub fn normalize_package(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            p => parts.push(p),
        }
    }
    Some(parts.join("/"))
}
