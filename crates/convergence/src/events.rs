//! Lifecycle event sink.
//!
//! The core reports exactly three notifications; sinks observe but never
//! influence control flow. All methods default to no-ops so a sink only
//! implements what it cares about.

use crate::error::FailureKind;
use crate::resource::ResourceIdent;

/// Receiver for resource lifecycle notifications.
pub trait EventSink {
    /// A `converge_by` block executed (or, when `simulated` is true, was
    /// narrated in why-run mode without executing).
    fn resource_update_applied(
        &mut self,
        _resource: &ResourceIdent,
        _action: &str,
        _descriptions: &[String],
        _simulated: bool,
    ) {
    }

    /// A declared requirement's predicate returned false.
    fn provider_requirement_failed(
        &mut self,
        _action: &str,
        _resource: &ResourceIdent,
        _kind: FailureKind,
        _message: &str,
    ) {
    }

    /// Why-run mode assumed a failed requirement away; `message` is the
    /// declared narrative.
    fn whyrun_assumption(&mut self, _action: &str, _resource: &ResourceIdent, _message: &str) {}
}

/// Sink that ignores every notification.
pub struct NullEventSink;

impl EventSink for NullEventSink {}

/// One recorded notification, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    UpdateApplied {
        resource: String,
        action: String,
        descriptions: Vec<String>,
        simulated: bool,
    },
    RequirementFailed {
        action: String,
        resource: String,
        kind: FailureKind,
        message: String,
    },
    WhyrunAssumption {
        action: String,
        resource: String,
        message: String,
    },
}

/// Sink that records notifications for inspection (test support).
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RecordedEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptions from every `UpdateApplied` event, flattened in order.
    pub fn applied_descriptions(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::UpdateApplied { descriptions, .. } => Some(descriptions.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn update_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::UpdateApplied { .. }))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn resource_update_applied(
        &mut self,
        resource: &ResourceIdent,
        action: &str,
        descriptions: &[String],
        simulated: bool,
    ) {
        self.events.push(RecordedEvent::UpdateApplied {
            resource: resource.to_string(),
            action: action.to_string(),
            descriptions: descriptions.to_vec(),
            simulated,
        });
    }

    fn provider_requirement_failed(
        &mut self,
        action: &str,
        resource: &ResourceIdent,
        kind: FailureKind,
        message: &str,
    ) {
        self.events.push(RecordedEvent::RequirementFailed {
            action: action.to_string(),
            resource: resource.to_string(),
            kind,
            message: message.to_string(),
        });
    }

    fn whyrun_assumption(&mut self, action: &str, resource: &ResourceIdent, message: &str) {
        self.events.push(RecordedEvent::WhyrunAssumption {
            action: action.to_string(),
            resource: resource.to_string(),
            message: message.to_string(),
        });
    }
}
