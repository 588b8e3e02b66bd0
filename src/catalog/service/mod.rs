//! Service resource provider.
//!
//! Generic start/stop/restart logic over a [`ServiceBackend`]; backends
//! supply the service-manager primitives. The init-script requirement is
//! the canonical why-run case: on a first run the script a package would
//! have installed may not exist yet, so why-run assumes it was created
//! and the service is stopped.

use convergence::{
    ConvergeContext, CurrentResourceSpec, FailureKind, Provider, ResourceRequirements,
    ResourceSpec, Result,
};

pub mod systemd;
pub mod sysvinit;

/// Observed run state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
}

/// Platform-specific service-manager primitives.
pub trait ServiceBackend: Send + Sync {
    /// Whether the unit/init script for this service is present.
    fn unit_available(&self, name: &str) -> bool;

    /// Path or unit name, for messages.
    fn unit_path(&self, name: &str) -> String;

    fn status(&self, name: &str) -> anyhow::Result<ServiceStatus>;

    fn start(&self, name: &str) -> anyhow::Result<()>;

    fn stop(&self, name: &str) -> anyhow::Result<()>;

    fn restart(&self, name: &str) -> anyhow::Result<()>;
}

/// Generic service provider parameterized by a [`ServiceBackend`].
pub struct ServiceProvider {
    id: &'static str,
    backend: Box<dyn ServiceBackend>,
    new_resource: ResourceSpec,
    current_resource: Option<CurrentResourceSpec>,
}

impl ServiceProvider {
    pub fn new(id: &'static str, backend: Box<dyn ServiceBackend>, spec: ResourceSpec) -> Self {
        Self {
            id,
            backend,
            new_resource: spec,
            current_resource: None,
        }
    }

    pub fn systemd(spec: ResourceSpec) -> Self {
        Self::new("systemd_service", Box::new(systemd::SystemdBackend), spec)
    }

    pub fn sysvinit(spec: ResourceSpec) -> Self {
        Self::new("sysvinit_service", Box::new(sysvinit::SysvInitBackend), spec)
    }

    fn service_name(&self) -> &str {
        &self.new_resource.name
    }

    /// Status as probed, or as assumed by a why-run modifier.
    fn current_status(&self) -> &str {
        self.current_resource
            .as_ref()
            .and_then(|c| c.get_str("status"))
            .unwrap_or("unknown")
    }

    fn action_start(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.current_status() == "running" {
            return Ok(());
        }
        let name = self.service_name().to_string();
        let backend = &self.backend;
        ctx.converge_by(format!("start service {name}"), |_| {
            backend.start(&name)?;
            Ok(())
        })?;
        Ok(())
    }

    fn action_stop(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.current_status() != "running" {
            return Ok(());
        }
        let name = self.service_name().to_string();
        let backend = &self.backend;
        ctx.converge_by(format!("stop service {name}"), |_| {
            backend.stop(&name)?;
            Ok(())
        })?;
        Ok(())
    }

    // Restart always converges, matching operator expectations: asking
    // for a restart means "do it", not "do it if stopped".
    fn action_restart(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        let name = self.service_name().to_string();
        let backend = &self.backend;
        ctx.converge_by(format!("restart service {name}"), |_| {
            backend.restart(&name)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl Provider for ServiceProvider {
    fn provider_name(&self) -> &'static str {
        self.id
    }

    fn new_resource(&self) -> &ResourceSpec {
        &self.new_resource
    }

    fn new_resource_mut(&mut self) -> &mut ResourceSpec {
        &mut self.new_resource
    }

    fn current_resource(&self) -> Option<&CurrentResourceSpec> {
        self.current_resource.as_ref()
    }

    fn current_resource_mut(&mut self) -> Option<&mut CurrentResourceSpec> {
        self.current_resource.as_mut()
    }

    fn load_current_resource(&mut self) -> Result<()> {
        let name = self.service_name().to_string();
        let mut current = ResourceSpec::new("service", &name);
        if self.backend.unit_available(&name) {
            let status = self.backend.status(&name)?;
            current.set(
                "status",
                match status {
                    ServiceStatus::Running => "running",
                    ServiceStatus::Stopped => "stopped",
                },
            );
        } else {
            // Missing unit is not a probe error; the requirement below
            // decides whether the run can proceed.
            current.set("status", "unknown");
        }
        self.current_resource = Some(current);
        Ok(())
    }

    fn define_resource_requirements(&mut self, requirements: &mut ResourceRequirements) {
        let name = self.service_name().to_string();
        let unit_path = self.backend.unit_path(&name);
        let available = self.backend.unit_available(&name);
        let resource = self.new_resource.to_string();

        requirements.assert(&["start", "stop", "restart"], move |a| {
            a.assertion(move || available);
            a.failure_message(
                FailureKind::MissingInitScript,
                format!("cannot manage {resource}: {unit_path} is missing"),
            );
            a.whyrun_modify(
                format!(
                    "Assuming {unit_path} would have been created and service {name} is stopped"
                ),
                |current| current.set("status", "stopped"),
            );
        });
    }

    fn dispatch(&mut self, action: &str, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        match action {
            "start" => self.action_start(ctx),
            "stop" => self.action_stop(ctx),
            "restart" => self.action_restart(ctx),
            other => Err(self.unsupported_action(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::{ActionOutcome, RecordedEvent, RecordingSink, RunContext, run_action};
    use std::sync::{Arc, Mutex};

    struct FakeBackend {
        available: bool,
        status: Mutex<ServiceStatus>,
        commands: Arc<Mutex<Vec<String>>>,
    }

    impl FakeBackend {
        fn new(available: bool, status: ServiceStatus) -> Self {
            Self {
                available,
                status: Mutex::new(status),
                commands: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ServiceBackend for FakeBackend {
        fn unit_available(&self, _name: &str) -> bool {
            self.available
        }

        fn unit_path(&self, name: &str) -> String {
            format!("/etc/init.d/{name}")
        }

        fn status(&self, _name: &str) -> anyhow::Result<ServiceStatus> {
            Ok(*self.status.lock().unwrap())
        }

        fn start(&self, _name: &str) -> anyhow::Result<()> {
            self.commands.lock().unwrap().push("start".into());
            *self.status.lock().unwrap() = ServiceStatus::Running;
            Ok(())
        }

        fn stop(&self, _name: &str) -> anyhow::Result<()> {
            self.commands.lock().unwrap().push("stop".into());
            *self.status.lock().unwrap() = ServiceStatus::Stopped;
            Ok(())
        }

        fn restart(&self, _name: &str) -> anyhow::Result<()> {
            self.commands.lock().unwrap().push("restart".into());
            *self.status.lock().unwrap() = ServiceStatus::Running;
            Ok(())
        }
    }

    fn provider(available: bool, status: ServiceStatus) -> ServiceProvider {
        ServiceProvider::new(
            "fake_service",
            Box::new(FakeBackend::new(available, status)),
            ResourceSpec::new("service", "nginx"),
        )
    }

    fn run(
        provider: &mut ServiceProvider,
        action: &str,
        whyrun: bool,
    ) -> (convergence::Result<ActionOutcome>, RecordingSink) {
        let mut sink = RecordingSink::new();
        let outcome = run_action(provider, action, &mut RunContext::new(whyrun, &mut sink));
        (outcome, sink)
    }

    #[test]
    fn start_converges_a_stopped_service() {
        let mut p = provider(true, ServiceStatus::Stopped);
        let (outcome, _) = run(&mut p, "start", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Converged);
    }

    #[test]
    fn start_is_idempotent_on_a_running_service() {
        let mut p = provider(true, ServiceStatus::Running);
        let (outcome, sink) = run(&mut p, "start", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Skipped);
        assert_eq!(sink.update_count(), 0);
    }

    #[test]
    fn stop_converges_only_a_running_service() {
        let mut p = provider(true, ServiceStatus::Running);
        let (outcome, _) = run(&mut p, "stop", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Converged);

        let mut p = provider(true, ServiceStatus::Stopped);
        let (outcome, _) = run(&mut p, "stop", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Skipped);
    }

    #[test]
    fn restart_always_converges() {
        for status in [ServiceStatus::Running, ServiceStatus::Stopped] {
            let mut p = provider(true, status);
            let (outcome, _) = run(&mut p, "restart", false);
            assert_eq!(outcome.unwrap(), ActionOutcome::Converged);
        }
    }

    #[test]
    fn missing_unit_fails_start_in_normal_mode() {
        let mut p = provider(false, ServiceStatus::Stopped);
        let (outcome, _) = run(&mut p, "start", false);
        let err = outcome.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::MissingInitScript));
        assert!(err.to_string().contains("/etc/init.d/nginx"));
    }

    #[test]
    fn missing_unit_is_assumed_stopped_in_whyrun() {
        let backend = FakeBackend::new(false, ServiceStatus::Stopped);
        let commands = Arc::clone(&backend.commands);
        let mut p = ServiceProvider::new(
            "fake_service",
            Box::new(backend),
            ResourceSpec::new("service", "nginx"),
        );
        let (outcome, sink) = run(&mut p, "start", true);
        // The modifier assumed "stopped", so a start would converge.
        assert_eq!(outcome.unwrap(), ActionOutcome::WouldConverge);
        assert!(
            sink.events
                .iter()
                .any(|e| matches!(e, RecordedEvent::WhyrunAssumption { .. }))
        );
        // Nothing actually ran against the backend.
        assert!(commands.lock().unwrap().is_empty());
    }
}
