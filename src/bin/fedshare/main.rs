//! fedshare CLI - inspect and run shared-module federation builds

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fedshare::core::share_config::ConfigError;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        match e.downcast::<ConfigError>() {
            Ok(config_error) => eprintln!("{:?}", miette::Report::new(config_error)),
            Err(e) => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("fedshare=debug")
    } else {
        EnvFilter::new("fedshare=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let global = cli::GlobalArgs {
        verbose: cli.verbose,
        color: !cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Normalize(args) => commands::normalize::execute(args, global),
        Commands::Build(args) => commands::build::execute(args, global),
        Commands::Resolve(args) => commands::resolve::execute(args, global),
    }
}
