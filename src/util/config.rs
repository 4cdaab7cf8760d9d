//! Configuration file support for Keel.
//!
//! Keel reads two configuration file locations:
//! - Global: `~/.keel/config.toml` - User-wide defaults
//! - Project: `<root>/.keel/config.toml` - Workspace-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the per-workspace and per-user Keel directory.
pub const KEEL_DIR: &str = ".keel";

/// Keel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// protoc invocation settings
    pub protoc: ProtocConfig,

    /// Build output settings
    pub build: BuildConfig,

    /// Workspace discovery settings
    pub workspace: WorkspaceConfig,
}

/// Settings for the external protobuf compiler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocConfig {
    /// Path to protoc (overrides PROTOC and PATH lookup)
    pub path: Option<PathBuf>,

    /// Extra include directories, relative to the workspace root
    pub include_dirs: Vec<PathBuf>,

    /// Extra arguments passed to every protoc invocation
    pub args: Vec<String>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory, relative to the workspace root (default `.keel/out`)
    pub out_dir: Option<PathBuf>,
}

/// Workspace discovery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Additional glob patterns of directories to skip
    pub exclude: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.protoc.path.is_some() {
            self.protoc.path = other.protoc.path;
        }
        if !other.protoc.include_dirs.is_empty() {
            self.protoc.include_dirs = other.protoc.include_dirs;
        }
        if !other.protoc.args.is_empty() {
            self.protoc.args = other.protoc.args;
        }

        if other.build.out_dir.is_some() {
            self.build.out_dir = other.build.out_dir;
        }

        // Exclusions accumulate: a project cannot un-exclude a global pattern.
        for pattern in other.workspace.exclude {
            if !self.workspace.exclude.contains(&pattern) {
                self.workspace.exclude.push(pattern);
            }
        }
    }

    /// Output directory for a workspace rooted at `root`.
    pub fn out_dir(&self, root: &Path) -> PathBuf {
        match &self.build.out_dir {
            Some(dir) => root.join(dir),
            None => root.join(KEEL_DIR).join("out"),
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (<root>/.keel/config.toml)
/// 2. Global config (~/.keel/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global keel config directory (~/.keel).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(KEEL_DIR))
}

/// Get the global config path (~/.keel/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (<root>/.keel/config.toml).
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(KEEL_DIR).join("config.toml")
}
