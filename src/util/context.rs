//! Global context for Keel operations.
//!
//! Provides centralized access to the working directory, workspace root
//! discovery, configuration paths, and verbosity.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::build_file::{find_build_file, LoadError};
use crate::util::config::{self, load_config, Config};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Explicit workspace root (`--root`), skipping discovery
    root: Option<PathBuf>,

    /// Whether to use verbose output
    verbose: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            root: None,
            verbose: false,
        }
    }

    /// Use an explicit workspace root instead of searching for one.
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        self.root = root.map(|r| {
            if r.is_absolute() {
                r
            } else {
                self.cwd.join(r)
            }
        });
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Find the workspace root.
    ///
    /// Starting at the working directory and walking upward, the root is the
    /// nearest directory whose build file has a `[workspace]` table.
    pub fn find_workspace_root(&self) -> Result<PathBuf, LoadError> {
        if let Some(root) = &self.root {
            find_build_file(root)?;
            return Ok(root.clone());
        }

        let mut current = self.cwd.clone();
        loop {
            match find_build_file(&current) {
                Ok(path) => {
                    if declares_workspace(&path)? {
                        tracing::debug!("workspace root: {}", current.display());
                        return Ok(current);
                    }
                }
                Err(LoadError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }

            if !current.pop() {
                return Err(LoadError::NotFound {
                    dir: self.cwd.clone(),
                });
            }
        }
    }

    /// Load the merged global and project configuration for a workspace.
    pub fn load_config(&self, root: &Path) -> Config {
        let global = config::global_config_path();
        load_config(global.as_deref(), &config::project_config_path(root))
    }

    /// The package path of the working directory relative to `root`, if inside it.
    pub fn current_package(&self, root: &Path) -> Option<String> {
        let cwd = crate::util::fs::normalize_path(&self.cwd);
        let root = crate::util::fs::normalize_path(root);
        let rel = cwd.strip_prefix(&root).ok()?;
        Some(crate::util::fs::to_package_path(rel))
    }
}

fn declares_workspace(path: &Path) -> Result<bool, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table =
        toml::from_str(&content).map_err(|source| LoadError::parse(path, &content, source))?;
    Ok(table.contains_key("workspace"))
}
