//! CLI definitions.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Declarative system convergence: describe desired state in a
/// manifest, converge the local system to match it.
#[derive(Parser)]
#[command(name = "converge", version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge the local system to match a manifest
    Apply(ApplyArgs),

    /// Show what apply would change, without changing anything
    Plan(PlanArgs),

    /// Print the detected platform facts
    Facts,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Path to the manifest file
    pub manifest: PathBuf,

    /// Narrate changes instead of performing them (why-run mode)
    #[arg(long)]
    pub why_run: bool,

    /// Continue past failed resources instead of aborting
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Path to the manifest file
    pub manifest: PathBuf,
}
