//! Requirement/assertion engine.
//!
//! Providers declare preconditions per action inside
//! `define_resource_requirements`. In a normal run a failed assertion
//! aborts the resource's action with the declared error; in why-run mode
//! an assertion with a narrative is assumed away instead, optionally
//! faking a plausible post-condition on the in-memory current resource.

use crate::error::{Error, FailureKind, Result};
use crate::events::EventSink;
use crate::provider::ACTION_NOTHING;
use crate::resource::{CurrentResourceSpec, ResourceIdent};
use std::collections::BTreeSet;

type Predicate = Box<dyn Fn() -> bool + Send>;
type ResourceModifier = Box<dyn FnMut(&mut CurrentResourceSpec) + Send>;

/// One declared precondition.
///
/// Configured through the closure passed to
/// [`ResourceRequirements::assert`]:
///
/// ```ignore
/// requirements.assert(&["start", "restart"], |a| {
///     a.assertion(move || init_script.exists());
///     a.failure_message(
///         FailureKind::MissingInitScript,
///         format!("init script {} is missing", init_script.display()),
///     );
///     a.whyrun_modify(
///         "Assuming init script would have been created and service is stopped",
///         |current| current.set("status", "stopped"),
///     );
/// });
/// ```
pub struct Assertion {
    predicate: Option<Predicate>,
    failure_kind: FailureKind,
    failure_message: Option<String>,
    whyrun_message: Option<String>,
    resource_modifier: Option<ResourceModifier>,
    block_action: bool,
    failed: bool,
}

impl Assertion {
    fn new() -> Self {
        Self {
            predicate: None,
            failure_kind: FailureKind::Assertion,
            failure_message: None,
            whyrun_message: None,
            resource_modifier: None,
            block_action: false,
            failed: false,
        }
    }

    /// The predicate that decides whether the requirement is met. An
    /// assertion with no predicate is treated as failing.
    pub fn assertion(&mut self, predicate: impl Fn() -> bool + Send + 'static) {
        self.predicate = Some(Box::new(predicate));
    }

    /// Declare the error raised when the predicate fails in normal mode.
    ///
    /// Without a failure message the assertion is soft: it never fails
    /// the run in either mode and can only gate via [`Self::block_action`].
    pub fn failure_message(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.failure_kind = kind;
        self.failure_message = Some(message.into());
    }

    /// Narrative emitted instead of failing when running in why-run mode.
    pub fn whyrun(&mut self, message: impl Into<String>) {
        self.whyrun_message = Some(message.into());
    }

    /// Like [`Self::whyrun`], plus a modifier applied to the in-memory
    /// current resource to fake a plausible post-condition.
    pub fn whyrun_modify(
        &mut self,
        message: impl Into<String>,
        modifier: impl FnMut(&mut CurrentResourceSpec) + Send + 'static,
    ) {
        self.whyrun_message = Some(message.into());
        self.resource_modifier = Some(Box::new(modifier));
    }

    /// Prevent the action body from running in why-run mode when this
    /// assertion fails, and stop evaluating further assertions for the
    /// action.
    pub fn block_action(&mut self) {
        self.block_action = true;
    }

    fn run(
        &mut self,
        action: &str,
        resource: &ResourceIdent,
        mut current: Option<&mut CurrentResourceSpec>,
        events: &mut dyn EventSink,
        whyrun: bool,
    ) -> Result<()> {
        let satisfied = self.predicate.as_ref().is_some_and(|p| p());
        if satisfied {
            return Ok(());
        }
        self.failed = true;

        if whyrun && self.whyrun_message.is_some() {
            events.provider_requirement_failed(
                action,
                resource,
                self.failure_kind,
                self.failure_message.as_deref().unwrap_or(""),
            );
            if let Some(message) = &self.whyrun_message {
                events.whyrun_assumption(action, resource, message);
            }
            if let Some(modifier) = &mut self.resource_modifier {
                match current.as_deref_mut() {
                    Some(cur) => modifier(cur),
                    None => log::debug!(
                        "{resource}: no current resource loaded, skipping why-run modifier"
                    ),
                }
            }
            return Ok(());
        }

        if let Some(message) = &self.failure_message {
            events.provider_requirement_failed(action, resource, self.failure_kind, message);
            return Err(Error::RequirementFailed {
                kind: self.failure_kind,
                message: message.clone(),
            });
        }
        Ok(())
    }
}

enum ActionScope {
    AllActions,
    Actions(Vec<String>),
}

/// The assertions registered by one provider for one action invocation.
///
/// Evaluation order: wildcard assertions first (skipped for the built-in
/// `nothing` action), then action-scoped ones, each group in
/// registration order.
pub struct ResourceRequirements {
    assertions: Vec<(ActionScope, Assertion)>,
    blocked: BTreeSet<String>,
    continue_after_block: bool,
}

impl ResourceRequirements {
    pub fn new() -> Self {
        Self {
            assertions: Vec::new(),
            blocked: BTreeSet::new(),
            continue_after_block: false,
        }
    }

    /// Register an assertion for the given actions.
    pub fn assert(&mut self, actions: &[&str], configure: impl FnOnce(&mut Assertion)) {
        let mut assertion = Assertion::new();
        configure(&mut assertion);
        self.assertions.push((
            ActionScope::Actions(actions.iter().map(ToString::to_string).collect()),
            assertion,
        ));
    }

    /// Register an assertion evaluated for every action.
    pub fn assert_all_actions(&mut self, configure: impl FnOnce(&mut Assertion)) {
        let mut assertion = Assertion::new();
        configure(&mut assertion);
        self.assertions.push((ActionScope::AllActions, assertion));
    }

    /// When true, a blocking assertion still lets later assertions for
    /// the same action evaluate their predicates. Defaults to false
    /// (first block halts further evaluation for the action).
    pub fn continue_after_block(&mut self, yes: bool) {
        self.continue_after_block = yes;
    }

    /// Whether a failed `block_action` assertion blocked this action.
    pub fn action_blocked(&self, action: &str) -> bool {
        self.blocked.contains(action)
    }

    /// Evaluate all assertions registered for `action`.
    pub fn run(
        &mut self,
        action: &str,
        resource: &ResourceIdent,
        mut current: Option<&mut CurrentResourceSpec>,
        events: &mut dyn EventSink,
        whyrun: bool,
    ) -> Result<()> {
        'passes: for wildcard_pass in [true, false] {
            if wildcard_pass && action == ACTION_NOTHING {
                continue;
            }
            for (scope, assertion) in &mut self.assertions {
                let applies = match scope {
                    ActionScope::AllActions => wildcard_pass,
                    ActionScope::Actions(actions) => {
                        !wildcard_pass && actions.iter().any(|a| a == action)
                    }
                };
                if !applies {
                    continue;
                }
                assertion.run(action, resource, current.as_deref_mut(), events, whyrun)?;
                if assertion.failed && assertion.block_action {
                    self.blocked.insert(action.to_string());
                    if !self.continue_after_block {
                        break 'passes;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for ResourceRequirements {
    fn default() -> Self {
        Self::new()
    }
}
