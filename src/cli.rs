//! CLI argument parsing for the digest pipeline.
//!
//! The CLI is intentionally thin: it selects a command and passes the loaded
//! configuration through, so the pipeline stages stay reusable outside the
//! binary entrypoint.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint for the study-digest pipeline.
#[derive(Parser, Debug)]
#[command(
    name = "sdigest",
    version,
    about = "Fetch the daily study digest, generate per-member infographics, and dispatch them",
    after_help = "Commands:\n  run    Full pipeline: fetch, parse, generate, dispatch\n  scan   Fetch (or read) a digest and print the reconciled roster\n  check  Probe the report endpoint, generation service, and Slack\n\nExamples:\n  sdigest run\n  sdigest run --date 2026-08-24 --dry-run\n  sdigest scan --json\n  sdigest scan --input digest.html --date 2026-08-24\n  sdigest check",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level pipeline commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Scan(ScanArgs),
    Check(CheckArgs),
}

/// Run the full pipeline for one target date.
#[derive(Parser, Debug)]
#[command(
    about = "Fetch the digest, generate infographics, and send them",
    after_help = "Exits nonzero when any member's generation or dispatch fails, even if\nother members succeeded; schedulers that tolerate partial runs should\ninspect the printed summary instead of the exit code."
)]
pub struct RunArgs {
    /// Target date (YYYY-MM-DD); defaults to the deadline-hour rule
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,

    /// Generate artifacts but skip Slack dispatch
    #[arg(long)]
    pub dry_run: bool,

    /// Override the artifact output directory
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Fetch and reconcile a digest without generating anything.
#[derive(Parser, Debug)]
#[command(about = "Print the reconciled per-member scan for a date")]
pub struct ScanArgs {
    /// Target date (YYYY-MM-DD); defaults to the deadline-hour rule
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,

    /// Read the raw digest payload from a file instead of the endpoint
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Probe each external collaborator and report reachability.
#[derive(Parser, Debug)]
#[command(about = "Test connections to the report endpoint, generation service, and Slack")]
pub struct CheckArgs {}
