//! Sequential converge runner.
//!
//! Resources converge strictly one at a time in manifest order; per
//! resource the provider is resolved once and instantiated fresh for
//! each requested action. A failure aborts the run unless keep-going
//! was requested.

use anyhow::Result;
use colored::Colorize;
use convergence::{
    ActionOutcome, EventSink, FailureKind, PlatformFacts, ProviderRegistry, ProviderResolver,
    ResourceIdent, ResourceSpec, RunContext, run_action,
};

/// Options for one converge run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Narrate changes instead of performing them
    pub whyrun: bool,
    /// Continue past failed resources instead of aborting
    pub keep_going: bool,
}

/// Counts of terminal states across one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub converged: usize,
    pub would_converge: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.converged + self.would_converge + self.skipped + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn add_outcome(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Converged => self.converged += 1,
            ActionOutcome::WouldConverge => self.would_converge += 1,
            ActionOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Event sink that prints lifecycle notifications for humans.
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn resource_update_applied(
        &mut self,
        _resource: &ResourceIdent,
        _action: &str,
        descriptions: &[String],
        simulated: bool,
    ) {
        for line in descriptions {
            if simulated {
                println!("  {} {}", "~".yellow(), line.yellow());
            } else {
                println!("  {} {}", "+".green(), line);
            }
        }
    }

    fn provider_requirement_failed(
        &mut self,
        action: &str,
        resource: &ResourceIdent,
        kind: FailureKind,
        message: &str,
    ) {
        eprintln!(
            "  {} {resource} ({action}): {} - {message}",
            "!".red(),
            kind.description().red()
        );
    }

    fn whyrun_assumption(&mut self, _action: &str, _resource: &ResourceIdent, message: &str) {
        println!("  {} {}", "?".cyan(), message.cyan());
    }
}

/// Converge a collection of resources against the local system.
pub fn converge(
    resources: Vec<ResourceSpec>,
    registry: &ProviderRegistry,
    facts: &PlatformFacts,
    options: &RunOptions,
) -> Result<RunSummary> {
    converge_with_sink(resources, registry, facts, options, &mut ConsoleSink)
}

/// Like [`converge`], reporting into the given sink.
pub fn converge_with_sink(
    resources: Vec<ResourceSpec>,
    registry: &ProviderRegistry,
    facts: &PlatformFacts,
    options: &RunOptions,
    sink: &mut dyn EventSink,
) -> Result<RunSummary> {
    let resolver = ProviderResolver::new(registry, facts);
    let mut summary = RunSummary::default();

    for spec in resources {
        let descriptor = match resolver.resolve(&spec) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                summary.failed += 1;
                if options.keep_going {
                    log::error!("{e}");
                    continue;
                }
                return Err(e.into());
            }
        };

        for action in spec.actions.clone() {
            log::info!("converging {spec} ({action}) via {}", descriptor.id());
            let mut provider = descriptor.instantiate(spec.clone());
            let mut ctx = RunContext::new(options.whyrun, &mut *sink);
            match run_action(provider.as_mut(), &action, &mut ctx) {
                Ok(outcome) => summary.add_outcome(outcome),
                Err(e) => {
                    summary.failed += 1;
                    if options.keep_going {
                        log::error!("error converging {spec} ({action}): {e}");
                        continue;
                    }
                    return Err(anyhow::Error::from(e)
                        .context(format!("error converging {spec} (action {action})")));
                }
            }
        }
    }

    Ok(summary)
}

/// Print the end-of-run summary line.
pub fn print_summary(summary: &RunSummary, whyrun: bool) {
    if whyrun {
        println!(
            "\n{}: {} would change, {} up to date, {} failed",
            "why-run complete".bold(),
            summary.would_converge.to_string().yellow(),
            summary.skipped,
            summary.failed
        );
    } else {
        println!(
            "\n{}: {} changed, {} up to date, {} failed",
            "converge complete".bold(),
            summary.converged.to_string().green(),
            summary.skipped,
            summary.failed
        );
    }
}
