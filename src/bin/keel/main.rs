//! Keel CLI - declarative protobuf build targets

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use keel::core::LoadError;
use keel::resolver::ResolveError;
use keel::util::diagnostic::emit;
use keel::GlobalContext;

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;

    if let Err(e) = run(cli) {
        report(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("keel=debug")
    } else {
        EnvFilter::new("keel=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .init();

    let mut ctx = GlobalContext::new()?.with_root(cli.root);
    ctx.set_verbose(cli.verbose);

    // Execute command
    match cli.command {
        Commands::Check(args) => commands::check::execute(args, &ctx),
        Commands::Targets(args) => commands::targets::execute(args, &ctx),
        Commands::Graph(args) => commands::graph::execute(args, &ctx),
        Commands::Plan(args) => commands::plan::execute(args, &ctx),
        Commands::Build(args) => commands::build::execute(args, &ctx),
        Commands::Clean(args) => commands::clean::execute(args, &ctx),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error, using the structured diagnostic when there is one.
fn report(err: &anyhow::Error, color: bool) {
    if let Some(load) = err.downcast_ref::<LoadError>() {
        emit(&load.to_diagnostic(), color);
    } else if let Some(resolve) = err.downcast_ref::<ResolveError>() {
        emit(&resolve.to_diagnostic(), color);
    } else {
        eprintln!("error: {:#}", err);
    }
}
