//! Provider protocol and the per-action state machine.
//!
//! Every resource type implements [`Provider`]; the engine drives each
//! instance through the same lifecycle: validate properties, load
//! current state, evaluate requirements, then dispatch the action. The
//! core is a thin sequencer — it never catches provider errors.

use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::recorder::ConvergeContext;
use crate::requirements::ResourceRequirements;
use crate::resource::{CurrentResourceSpec, PropertySchema, ResourceSpec};
use serde::Serialize;

/// The no-op action available on every resource.
pub const ACTION_NOTHING: &str = "nothing";

/// A concrete provider: one resource, one platform, short-lived.
///
/// An instance owns exactly one [`ResourceSpec`] and builds exactly one
/// [`CurrentResourceSpec`] per action invocation; it is never shared
/// across resources or runs.
pub trait Provider {
    /// Provider id, as registered (used in error messages).
    fn provider_name(&self) -> &'static str;

    fn new_resource(&self) -> &ResourceSpec;

    fn new_resource_mut(&mut self) -> &mut ResourceSpec;

    /// The probed current state; `None` until `load_current_resource`
    /// has run.
    fn current_resource(&self) -> Option<&CurrentResourceSpec>;

    fn current_resource_mut(&mut self) -> Option<&mut CurrentResourceSpec>;

    /// Property declarations validated before any system probe.
    fn property_schema(&self) -> Option<PropertySchema> {
        None
    }

    /// Probe the live system and build the current resource.
    ///
    /// Must not mutate the desired state except to fill unset properties
    /// naturally discoverable from current state. "The managed entity
    /// does not exist yet" is not an error; a failing probe is.
    fn load_current_resource(&mut self) -> Result<()>;

    /// Register assertions for this invocation. Must not perform side
    /// effects beyond registration.
    fn define_resource_requirements(&mut self, _requirements: &mut ResourceRequirements) {}

    /// Invoke the handler for `action`. Implementations match on the
    /// action name and fall through to [`Self::unsupported_action`] for
    /// actions they deliberately do not implement.
    fn dispatch(&mut self, action: &str, ctx: &mut ConvergeContext<'_>) -> Result<()>;

    /// The error for an action this provider does not support.
    fn unsupported_action(&self, action: &str) -> Error {
        Error::UnsupportedAction {
            provider: self.provider_name().to_string(),
            action: action.to_string(),
            resource: self.new_resource().to_string(),
        }
    }
}

/// Per-run state shared by every resource dispatch: the run mode and the
/// event sink. The why-run flag is set once before the run and never
/// changes mid-run.
pub struct RunContext<'a> {
    pub whyrun: bool,
    pub events: &'a mut dyn EventSink,
}

impl<'a> RunContext<'a> {
    pub fn new(whyrun: bool, events: &'a mut dyn EventSink) -> Self {
        Self { whyrun, events }
    }
}

/// Terminal state of one action on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionOutcome {
    /// At least one converge block executed
    Converged,
    /// Why-run mode: at least one converge block was narrated
    WouldConverge,
    /// Current state already matched desired state (still a success)
    Skipped,
}

impl ActionOutcome {
    /// Whether the resource counts as updated for reporting purposes.
    pub fn updated(&self) -> bool {
        matches!(self, Self::Converged | Self::WouldConverge)
    }
}

/// Run one action on one provider instance.
///
/// Sequence: property validation → `load_current_resource` →
/// `define_resource_requirements` → requirement evaluation → action
/// dispatch (unless blocked in why-run mode, or the `nothing` action).
/// Steps execute strictly in this order; any error propagates to the
/// caller, which owns the continue-vs-abort policy.
pub fn run_action(
    provider: &mut dyn Provider,
    action: &str,
    ctx: &mut RunContext<'_>,
) -> Result<ActionOutcome> {
    let ident = provider.new_resource().ident();
    log::debug!("processing {ident} action {action}");

    if let Some(schema) = provider.property_schema() {
        schema.validate(provider.new_resource_mut(), action)?;
    }

    provider.load_current_resource()?;

    let mut requirements = ResourceRequirements::new();
    provider.define_resource_requirements(&mut requirements);
    requirements.run(
        action,
        &ident,
        provider.current_resource_mut(),
        ctx.events,
        ctx.whyrun,
    )?;

    let mut converge = ConvergeContext::new(ident.clone(), action, ctx.whyrun, &mut *ctx.events);
    if action == ACTION_NOTHING {
        log::trace!("doing nothing for {ident}");
    } else if ctx.whyrun && requirements.action_blocked(action) {
        log::debug!("skipping action {action} on {ident}: blocked by failed precondition");
    } else {
        provider.dispatch(action, &mut converge)?;
    }

    if converge.updated() {
        Ok(if ctx.whyrun {
            ActionOutcome::WouldConverge
        } else {
            ActionOutcome::Converged
        })
    } else {
        log::debug!("{ident} is up to date");
        Ok(ActionOutcome::Skipped)
    }
}
