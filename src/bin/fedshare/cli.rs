//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// fedshare - shared-module federation for JavaScript bundles
#[derive(Parser)]
#[command(name = "fedshare")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct GlobalArgs {
    pub verbose: bool,
    pub color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the normalized share declarations as JSON
    Normalize(NormalizeArgs),

    /// Build the shared modules of the current project
    Build(BuildArgs),

    /// Simulate runtime resolution against a registry snapshot
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct NormalizeArgs {
    /// Federation config (defaults to the nearest federation.json/.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Federation config (defaults to the nearest federation.json/.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format (human, json)
    #[arg(long, value_name = "FMT")]
    pub message_format: Option<String>,

    /// Reuse units from the previous build
    #[arg(long)]
    pub cache: bool,

    /// Build mode (development, production)
    #[arg(long)]
    pub mode: Option<String>,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Also run a child build for this target (client, server)
    #[arg(long = "child", value_name = "TARGET")]
    pub children: Vec<String>,

    /// Print generated sources in human output
    #[arg(long)]
    pub sources: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Registry snapshot (JSON)
    #[arg(long)]
    pub state: PathBuf,

    /// Share scope to resolve in
    pub scope: String,

    /// Share key to load
    pub key: String,

    /// Required version range
    #[arg(long)]
    pub range: Option<String>,

    /// Allow only one active version
    #[arg(long)]
    pub singleton: bool,

    /// Fail instead of warning on a version mismatch
    #[arg(long)]
    pub strict: bool,

    /// Local fallback module to use when nothing matches
    #[arg(long)]
    pub fallback: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}
