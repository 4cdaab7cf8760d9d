//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Keel - declarative protobuf build targets
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Workspace root (skips searching upward for `[workspace]`)
    #[arg(long, global = true, value_name = "DIR", env = "KEEL_ROOT")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load every build file and resolve all references
    Check(CheckArgs),

    /// List declared targets
    Targets(TargetsArgs),

    /// Display the target dependency tree
    Graph(GraphArgs),

    /// Print the build plan as JSON
    Plan(PlanArgs),

    /// Build targets with protoc
    Build(BuildArgs),

    /// Remove build outputs
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct CheckArgs {}

#[derive(Args)]
pub struct TargetsArgs {
    /// Only list targets of this package (`.` for the current directory)
    #[arg(short, long)]
    pub package: Option<String>,

    /// Print targets as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Target to show the tree for (defaults to every target)
    pub target: Option<String>,

    /// Maximum depth to display
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Show dependents instead of dependencies
    #[arg(long)]
    pub reverse: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Targets to plan (defaults to every target)
    pub targets: Vec<String>,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Targets to build (defaults to every target)
    pub targets: Vec<String>,

    /// Rebuild even if outputs are up to date
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CleanArgs {}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
