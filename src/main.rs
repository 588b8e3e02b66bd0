mod catalog;
mod cli;
mod facts;
mod manifest;
mod runner;

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use runner::RunOptions;
use std::io;
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Apply(args) => apply(&args.manifest, args.why_run, args.keep_going),
        Command::Plan(args) => apply(&args.manifest, true, false),
        Command::Facts => {
            let facts = facts::detect();
            println!("family:  {}", facts.family);
            println!("name:    {}", facts.name);
            println!("version: {}", facts.version);
            Ok(())
        }
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "converge", &mut io::stdout());
            Ok(())
        }
    }
}

fn apply(manifest_path: &Path, whyrun: bool, keep_going: bool) -> Result<()> {
    let registry = catalog::builtin_registry();
    let facts = facts::detect();
    log::info!("platform: {facts}");

    let manifest = manifest::load(manifest_path)?;
    let resources = manifest::to_specs(manifest, &registry)?;
    if resources.is_empty() {
        println!("nothing to do: manifest declares no resources");
        return Ok(());
    }

    let options = RunOptions { whyrun, keep_going };
    let summary = runner::converge(resources, &registry, &facts, &options)?;
    runner::print_summary(&summary, whyrun);

    if !summary.is_success() {
        bail!("{} resource(s) failed to converge", summary.failed);
    }
    Ok(())
}
