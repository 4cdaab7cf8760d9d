//! Build executor with progress reporting.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::builder::context::BuildContext;
use crate::builder::fingerprint::{step_fingerprint, FingerprintCache};
use crate::builder::plan::{BuildPlan, BuildStep};
use crate::builder::protoc::ProtoCompiler;
use crate::util::diagnostic::suggestions;

/// Result of building one target.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Target label
    pub target: String,
    /// Files the step produced
    pub outputs: Vec<PathBuf>,
    /// Whether the step was skipped as up to date
    pub fresh: bool,
}

/// Runs a build plan step by step, in plan order.
pub struct BuildExecutor<'a> {
    ctx: &'a BuildContext,
    compiler: &'a dyn ProtoCompiler,
    force: bool,
    verbose: bool,
}

impl<'a> BuildExecutor<'a> {
    /// Create a new build executor.
    pub fn new(ctx: &'a BuildContext, compiler: &'a dyn ProtoCompiler) -> Self {
        BuildExecutor {
            ctx,
            compiler,
            force: false,
            verbose: false,
        }
    }

    /// Rebuild every step regardless of fingerprints.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Enable verbose output.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Execute a build plan with progress reporting.
    pub fn execute(&self, plan: &BuildPlan) -> Result<Vec<Artifact>> {
        let start = Instant::now();
        let fingerprint_path = self.ctx.fingerprint_path();
        let mut cache = FingerprintCache::load(&fingerprint_path)?;
        let identity = self.compiler.identity();

        if self.verbose {
            eprintln!("  Descriptors {} target(s)", plan.descriptor_count());
            eprintln!("   Generating {} target(s)", plan.generate_count());
        }

        let total = plan.steps.len();
        let pb = if !self.verbose && total > 1 {
            let style = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            let pb = ProgressBar::new(total as u64);
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let mut artifacts = Vec::with_capacity(total);
        let mut ran = 0;

        for step in &plan.steps {
            let target = step.target();
            let fingerprint = step_fingerprint(step, &identity)
                .with_context(|| format!("failed to fingerprint `{}`", target))?;

            if !self.force && !cache.needs_run(step, &fingerprint) {
                tracing::debug!("fresh {}", target);
                artifacts.push(Artifact {
                    target: target.to_string(),
                    outputs: step.outputs(),
                    fresh: true,
                });
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                continue;
            }

            match &pb {
                Some(pb) => pb.set_message(target.to_string()),
                None => eprintln!("    Building {} ({})", target, step.description()),
            }

            let result = match step {
                BuildStep::Descriptor(s) => self.compiler.compile_descriptors(s),
                BuildStep::Generate(s) => self.compiler.generate_cpp(s),
            };
            if let Err(e) = result {
                if let Some(pb) = &pb {
                    pb.abandon();
                }
                // keep what already succeeded
                if ran > 0 {
                    cache.save(&fingerprint_path)?;
                }
                return Err(anyhow!(
                    "failed to build `{}`: {:#}\n\nhelp: {}",
                    target,
                    e,
                    suggestions::BUILD_FAILED
                ));
            }

            let outputs = step.outputs();
            for missing in outputs.iter().filter(|o| !o.exists()) {
                tracing::warn!("`{}` did not produce {}", target, missing.display());
            }

            cache.update(target, fingerprint);
            ran += 1;
            artifacts.push(Artifact {
                target: target.to_string(),
                outputs,
                fresh: false,
            });
            if let Some(pb) = &pb {
                pb.inc(1);
            }
        }

        if ran > 0 {
            cache.save(&fingerprint_path)?;
        }

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let elapsed = start.elapsed();
        eprintln!(
            "    Finished {} target(s) in {:.2}s ({} fresh)",
            artifacts.len(),
            elapsed.as_secs_f64(),
            artifacts.len() - ran
        );

        Ok(artifacts)
    }
}
