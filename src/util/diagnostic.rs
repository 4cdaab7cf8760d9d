//! User-friendly diagnostic messages.
//!
//! Every load or resolve failure is reported with the failing file, the
//! target involved, and at least one suggested fix.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when no workspace root is found.
    pub const NO_WORKSPACE: &str =
        "Add a `[workspace]` table to the root Keel.toml, or pass `--root <dir>`";

    /// Suggestion when a target name is declared twice.
    pub const RENAME_TARGET: &str = "Rename one of the targets; names are unique per build file";

    /// Suggestion when the kind is missing or unknown.
    pub const KNOWN_KINDS: &str = "Use `kind = \"proto\"` or `kind = \"protocc\"`";

    /// Suggestion when a target lists no sources.
    pub const ADD_SOURCES: &str = "List at least one entry in `srcs`";

    /// Suggestion when a reference cannot be resolved.
    pub const UNRESOLVED: &str = "Run `keel targets` to see the declared targets";

    /// Suggestion when protoc cannot be found.
    pub const NO_PROTOC: &str =
        "Install protoc, set the PROTOC environment variable, or set `[protoc] path` in .keel/config.toml";

    /// Suggestion when protoc fails.
    pub const BUILD_FAILED: &str = "Run `keel build --verbose` for the full protoc command line";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
    /// Line and column within `location`
    pub position: Option<(usize, usize)>,
}

impl Diagnostic {
    fn with_severity(message: impl Into<String>, severity: Severity) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
            position: None,
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(message, Severity::Error)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_severity(message, Severity::Warning)
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location. Only the first location is kept.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        if self.location.is_none() {
            self.location = Some(path.into());
        }
        self
    }

    /// Point at a 1-based line and column within the location.
    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.position = Some((line, column));
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        match (&self.location, self.position) {
            (Some(path), Some((line, column))) => {
                output.push_str(&format!("  --> {}:{}:{}\n", path.display(), line, column));
            }
            (Some(path), None) => output.push_str(&format!("  --> {}\n", path.display())),
            (None, _) => {}
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
