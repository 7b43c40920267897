//! Quay CLI - build orchestrator for binding-module groups

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("quay=debug")
    } else {
        EnvFilter::new("quay=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let global = cli.global();
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &global),
        Commands::Plan(args) => commands::plan::execute(args, &global),
        Commands::Glue(args) => commands::glue::execute(args, &global),
        Commands::Groups(args) => commands::groups::execute(args, &global),
        Commands::Clean(args) => commands::clean::execute(args, &global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
