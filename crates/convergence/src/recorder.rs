//! Converge-action recorder.
//!
//! `converge_by` is the single choke point that makes why-run possible:
//! every mutating statement in every provider is wrapped in it. In a
//! normal run the block executes; in why-run mode only the description
//! is recorded and reported.

use crate::error::Result;
use crate::events::EventSink;
use crate::resource::ResourceIdent;

/// Description of one pending change: one or more human-readable lines.
pub struct Descriptions(pub Vec<String>);

impl From<&str> for Descriptions {
    fn from(line: &str) -> Self {
        Self(vec![line.to_string()])
    }
}

impl From<String> for Descriptions {
    fn from(line: String) -> Self {
        Self(vec![line])
    }
}

impl From<Vec<String>> for Descriptions {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

impl From<&[&str]> for Descriptions {
    fn from(lines: &[&str]) -> Self {
        Self(lines.iter().map(ToString::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Descriptions {
    fn from(lines: [&str; N]) -> Self {
        Self::from(&lines[..])
    }
}

/// Collected descriptions of the changes one action performed (normal
/// mode) or would perform (why-run mode).
#[derive(Debug, Default)]
pub struct ConvergeActions {
    actions: Vec<Vec<String>>,
}

impl ConvergeActions {
    fn record(&mut self, descriptions: Vec<String>) {
        self.actions.push(descriptions);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn descriptions(&self) -> &[Vec<String>] {
        &self.actions
    }
}

/// Context handed to a provider's action body.
///
/// Carries the run mode, the resource identity for reporting, and the
/// recorder. Converge blocks receive the context back so they can nest
/// further `converge_by` calls.
pub struct ConvergeContext<'a> {
    resource: ResourceIdent,
    action: String,
    whyrun: bool,
    events: &'a mut dyn EventSink,
    recorder: ConvergeActions,
}

impl<'a> ConvergeContext<'a> {
    pub fn new(
        resource: ResourceIdent,
        action: &str,
        whyrun: bool,
        events: &'a mut dyn EventSink,
    ) -> Self {
        Self {
            resource,
            action: action.to_string(),
            whyrun,
            events,
            recorder: ConvergeActions::default(),
        }
    }

    /// Whether this run only narrates changes.
    pub fn whyrun_mode(&self) -> bool {
        self.whyrun
    }

    pub fn resource(&self) -> &ResourceIdent {
        &self.resource
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Whether any converge block executed or was narrated. Monotonic:
    /// nested calls never double-count.
    pub fn updated(&self) -> bool {
        !self.recorder.is_empty()
    }

    pub fn descriptions(&self) -> &[Vec<String>] {
        self.recorder.descriptions()
    }

    /// Record a pending change and perform it.
    ///
    /// In normal mode the block runs immediately and its value is
    /// returned as `Some`. In why-run mode the block is skipped and
    /// `None` is returned; callers must not chain logic off the value.
    /// The description is reported before the block runs, so nested
    /// calls report outer-first.
    pub fn converge_by<T>(
        &mut self,
        description: impl Into<Descriptions>,
        block: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        let lines = description.into().0;
        self.recorder.record(lines.clone());
        self.events
            .resource_update_applied(&self.resource, &self.action, &lines, self.whyrun);
        if self.whyrun {
            log::info!("{}: would {}", self.resource, lines.join("; "));
            return Ok(None);
        }
        log::debug!("{}: {}", self.resource, lines.join("; "));
        block(self).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RecordedEvent, RecordingSink};
    use crate::resource::ResourceSpec;

    fn ident() -> ResourceIdent {
        ResourceSpec::new("file", "/tmp/x").ident()
    }

    #[test]
    fn normal_mode_executes_block_and_returns_value() {
        let mut sink = RecordingSink::new();
        let mut ctx = ConvergeContext::new(ident(), "create", false, &mut sink);
        let result = ctx
            .converge_by("create file /tmp/x", |_| Ok(42))
            .unwrap();
        assert_eq!(result, Some(42));
        assert!(ctx.updated());
        assert_eq!(sink.update_count(), 1);
    }

    #[test]
    fn whyrun_mode_skips_block_and_returns_none() {
        let mut executed = false;
        let mut sink = RecordingSink::new();
        let mut ctx = ConvergeContext::new(ident(), "create", true, &mut sink);
        let result = ctx
            .converge_by("create file /tmp/x", |_| {
                executed = true;
                Ok(42)
            })
            .unwrap();
        assert_eq!(result, None);
        assert!(!executed);
        assert!(ctx.updated());
        assert!(matches!(
            sink.events.as_slice(),
            [RecordedEvent::UpdateApplied { simulated: true, .. }]
        ));
    }

    #[test]
    fn nested_converge_reports_outer_first_and_counts_once() {
        let mut sink = RecordingSink::new();
        let mut ctx = ConvergeContext::new(ident(), "create", false, &mut sink);
        ctx.converge_by("outer", |ctx| {
            ctx.converge_by("inner", |_| Ok(()))?;
            Ok(())
        })
        .unwrap();
        assert!(ctx.updated());
        assert_eq!(sink.applied_descriptions(), vec!["outer", "inner"]);
    }

    #[test]
    fn multi_line_description_is_reported_in_order() {
        let mut sink = RecordingSink::new();
        let mut ctx = ConvergeContext::new(ident(), "create", false, &mut sink);
        ctx.converge_by(
            ["unlink existing file at /tmp/x", "create symlink /tmp/x -> /etc/x"],
            |_| Ok(()),
        )
        .unwrap();
        assert_eq!(
            sink.applied_descriptions(),
            vec![
                "unlink existing file at /tmp/x",
                "create symlink /tmp/x -> /etc/x"
            ]
        );
    }

    #[test]
    fn no_converge_calls_means_not_updated() {
        let mut sink = RecordingSink::new();
        let ctx = ConvergeContext::new(ident(), "create", false, &mut sink);
        assert!(!ctx.updated());
    }

    #[test]
    fn block_error_propagates_after_reporting() {
        let mut sink = RecordingSink::new();
        let mut ctx = ConvergeContext::new(ident(), "create", false, &mut sink);
        let err = ctx
            .converge_by("create file /tmp/x", |_| -> Result<()> {
                Err(anyhow::anyhow!("disk full").into())
            })
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(sink.update_count(), 1);
    }
}
