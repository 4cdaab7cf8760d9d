//! Build fingerprinting for incremental builds.
//!
//! A step's fingerprint covers its serialized description, the compiler
//! identity, and the contents of every input file. A step is fresh when
//! its fingerprint matches the stored one and all its outputs exist.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::plan::BuildStep;
use crate::util::fs::write_string;
use crate::util::hash::Fingerprint;

/// Compute the fingerprint of a build step.
pub fn step_fingerprint(step: &BuildStep, compiler: &str) -> Result<String> {
    let description = serde_json::to_string(step)?;

    let mut fp = Fingerprint::new();
    fp.update_strs([description.as_str(), compiler]);
    for input in step.inputs() {
        fp.update_file(input)?;
    }
    Ok(fp.finish())
}

/// Stored fingerprints, keyed by target label.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FingerprintCache {
    pub steps: BTreeMap<String, String>,
}

impl FingerprintCache {
    /// Load the cache; a missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(FingerprintCache::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match serde_json::from_str(&content) {
            Ok(cache) => Ok(cache),
            Err(e) => {
                tracing::warn!("ignoring corrupt fingerprint file {}: {}", path.display(), e);
                Ok(FingerprintCache::default())
            }
        }
    }

    /// Save the cache.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_string(path, &content)
    }

    /// Check whether a step must run.
    pub fn needs_run(&self, step: &BuildStep, current: &str) -> bool {
        let stored = self.steps.get(step.target()).map(String::as_str);
        stored != Some(current) || step.outputs().iter().any(|o| !o.exists())
    }

    /// Record a successful step.
    pub fn update(&mut self, target: impl Into<String>, fingerprint: String) {
        self.steps.insert(target.into(), fingerprint);
    }
}
