//! Package resource provider.
//!
//! The compare/converge logic lives here once; platform backends supply
//! only the primitives (query installed/candidate versions, install,
//! remove). Each backend also keeps its own package-name validation
//! rules - they differ between package managers and are deliberately
//! not unified.

use convergence::{
    ConvergeContext, CurrentResourceSpec, Error, FailureKind, PropertyDefinition, PropertySchema,
    Provider, ResourceRequirements, ResourceSpec, Result,
};

pub mod apt;
pub mod homebrew;

/// Platform-specific package-manager primitives.
pub trait PackageBackend: Send + Sync {
    /// Package-name rules for this package manager.
    fn validate_name(&self, name: &str) -> std::result::Result<(), String>;

    /// Installed version, or `None` when the package is not installed.
    /// An `Err` means the probe itself failed.
    fn installed_version(&self, name: &str) -> anyhow::Result<Option<String>>;

    /// Version that an install would fetch, or `None` when no source
    /// offers the package.
    fn candidate_version(&self, name: &str) -> anyhow::Result<Option<String>>;

    fn install(&self, name: &str, version: Option<&str>) -> anyhow::Result<()>;

    fn remove(&self, name: &str) -> anyhow::Result<()>;
}

/// Generic package provider parameterized by a [`PackageBackend`].
pub struct PackageProvider {
    id: &'static str,
    backend: Box<dyn PackageBackend>,
    new_resource: ResourceSpec,
    current_resource: Option<CurrentResourceSpec>,
    candidate: Option<String>,
}

impl PackageProvider {
    pub fn new(id: &'static str, backend: Box<dyn PackageBackend>, spec: ResourceSpec) -> Self {
        Self {
            id,
            backend,
            new_resource: spec,
            current_resource: None,
            candidate: None,
        }
    }

    pub fn apt(spec: ResourceSpec) -> Self {
        Self::new("apt_package", Box::new(apt::AptBackend), spec)
    }

    pub fn homebrew(spec: ResourceSpec) -> Self {
        Self::new("homebrew_package", Box::new(homebrew::BrewBackend), spec)
    }

    fn package_name(&self) -> &str {
        &self.new_resource.name
    }

    fn installed_version(&self) -> Option<String> {
        self.current_resource
            .as_ref()
            .and_then(|c| c.get_str("version"))
            .map(ToString::to_string)
    }

    /// Candidate as probed, or as assumed by a why-run modifier.
    fn effective_candidate(&self) -> Option<String> {
        self.candidate.clone().or_else(|| {
            self.current_resource
                .as_ref()
                .and_then(|c| c.get_str("candidate"))
                .map(ToString::to_string)
        })
    }

    fn action_install(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        let name = self.package_name().to_string();
        let desired = self.new_resource.get_str("version").map(ToString::to_string);
        let installed = self.installed_version();

        let needs_install = match (&installed, &desired) {
            (None, _) => true,
            (Some(current), Some(wanted)) => current != wanted,
            (Some(_), None) => false,
        };
        if !needs_install {
            return Ok(());
        }

        let target = desired
            .clone()
            .or_else(|| self.effective_candidate())
            .unwrap_or_else(|| "latest".to_string());
        let description = format!("install package {name} ({target})");
        let backend = &self.backend;
        ctx.converge_by(description, |_| {
            backend.install(&name, desired.as_deref())?;
            Ok(())
        })?;
        Ok(())
    }

    fn action_upgrade(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        let name = self.package_name().to_string();
        let installed = self.installed_version();
        let candidate = self.effective_candidate();

        let needs_upgrade = match (&installed, &candidate) {
            (None, _) => true,
            (Some(current), Some(wanted)) => current != wanted,
            (Some(_), None) => false,
        };
        if !needs_upgrade {
            return Ok(());
        }

        let target = candidate.unwrap_or_else(|| "latest".to_string());
        let description = match &installed {
            Some(current) => format!("upgrade package {name} from {current} to {target}"),
            None => format!("install package {name} ({target})"),
        };
        let backend = &self.backend;
        ctx.converge_by(description, |_| {
            backend.install(&name, None)?;
            Ok(())
        })?;
        Ok(())
    }

    fn action_remove(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        let Some(installed) = self.installed_version() else {
            return Ok(());
        };
        let name = self.package_name().to_string();
        let description = format!("remove package {name} ({installed})");
        let backend = &self.backend;
        ctx.converge_by(description, |_| {
            backend.remove(&name)?;
            Ok(())
        })?;
        Ok(())
    }
}

impl Provider for PackageProvider {
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

    fn property_schema(&self) -> Option<PropertySchema> {
        Some(PropertySchema::new().property("version", PropertyDefinition::string()))
    }

    fn load_current_resource(&mut self) -> Result<()> {
        let name = self.package_name().to_string();
        if let Err(reason) = self.backend.validate_name(&name) {
            return Err(Error::ValidationFailed {
                resource: self.new_resource.to_string(),
                message: reason,
            });
        }

        let mut current = ResourceSpec::new("package", &name);
        if let Some(version) = self.backend.installed_version(&name)? {
            current.set("version", version);
        }
        self.candidate = self.backend.candidate_version(&name)?;
        self.current_resource = Some(current);
        Ok(())
    }

    fn define_resource_requirements(&mut self, requirements: &mut ResourceRequirements) {
        let name = self.package_name().to_string();
        let has_candidate = self.candidate.is_some();
        let already_installed = self.installed_version().is_some();

        requirements.assert(&["install", "upgrade"], move |a| {
            a.assertion(move || has_candidate || already_installed);
            a.failure_message(
                FailureKind::Package,
                format!("package {name} has no candidate version on this system"),
            );
            a.whyrun_modify(
                format!(
                    "Assuming a source providing package {name} would have been configured earlier in the run"
                ),
                |current| current.set("candidate", "assumed"),
            );
        });
    }

    fn dispatch(&mut self, action: &str, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        match action {
            "install" => self.action_install(ctx),
            "upgrade" => self.action_upgrade(ctx),
            "remove" => self.action_remove(ctx),
            other => Err(self.unsupported_action(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convergence::{ActionOutcome, RecordedEvent, RecordingSink, RunContext, run_action};
    use std::sync::Mutex;

    /// In-memory backend: a fake package database.
    struct FakeBackend {
        installed: Mutex<Option<String>>,
        candidate: Option<String>,
        installs: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeBackend {
        fn new(installed: Option<&str>, candidate: Option<&str>) -> Self {
            Self {
                installed: Mutex::new(installed.map(ToString::to_string)),
                candidate: candidate.map(ToString::to_string),
                installs: Mutex::new(Vec::new()),
            }
        }
    }

    impl PackageBackend for FakeBackend {
        fn validate_name(&self, name: &str) -> std::result::Result<(), String> {
            if name.is_empty() {
                Err("package name must not be empty".into())
            } else {
                Ok(())
            }
        }

        fn installed_version(&self, _name: &str) -> anyhow::Result<Option<String>> {
            Ok(self.installed.lock().unwrap().clone())
        }

        fn candidate_version(&self, _name: &str) -> anyhow::Result<Option<String>> {
            Ok(self.candidate.clone())
        }

        fn install(&self, name: &str, version: Option<&str>) -> anyhow::Result<()> {
            self.installs
                .lock()
                .unwrap()
                .push((name.to_string(), version.map(ToString::to_string)));
            *self.installed.lock().unwrap() = Some(
                version
                    .map(ToString::to_string)
                    .or_else(|| self.candidate.clone())
                    .unwrap_or_else(|| "0".into()),
            );
            Ok(())
        }

        fn remove(&self, _name: &str) -> anyhow::Result<()> {
            *self.installed.lock().unwrap() = None;
            Ok(())
        }
    }

    fn provider(installed: Option<&str>, candidate: Option<&str>) -> PackageProvider {
        PackageProvider::new(
            "fake_package",
            Box::new(FakeBackend::new(installed, candidate)),
            ResourceSpec::new("package", "git"),
        )
    }

    fn run(
        provider: &mut PackageProvider,
        action: &str,
        whyrun: bool,
    ) -> (convergence::Result<ActionOutcome>, RecordingSink) {
        let mut sink = RecordingSink::new();
        let outcome = run_action(provider, action, &mut RunContext::new(whyrun, &mut sink));
        (outcome, sink)
    }

    #[test]
    fn install_converges_when_absent() {
        let mut p = provider(None, Some("2.43.0"));
        let (outcome, sink) = run(&mut p, "install", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Converged);
        assert!(
            sink.applied_descriptions()
                .iter()
                .any(|d| d.contains("install package git (2.43.0)"))
        );
    }

    #[test]
    fn install_is_idempotent_when_present() {
        let mut p = provider(Some("2.43.0"), Some("2.43.0"));
        let (outcome, sink) = run(&mut p, "install", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Skipped);
        assert_eq!(sink.update_count(), 0);
    }

    #[test]
    fn install_honors_a_pinned_version() {
        let mut p = provider(Some("2.40.0"), Some("2.43.0"));
        p.new_resource.set("version", "2.43.0");
        let (outcome, _) = run(&mut p, "install", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Converged);
    }

    #[test]
    fn missing_candidate_fails_install_in_normal_mode() {
        let mut p = provider(None, None);
        let (outcome, _) = run(&mut p, "install", false);
        let err = outcome.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::Package));
        assert!(err.to_string().contains("git"));
    }

    #[test]
    fn missing_candidate_is_assumed_away_in_whyrun() {
        let mut p = provider(None, None);
        let (outcome, sink) = run(&mut p, "install", true);
        assert_eq!(outcome.unwrap(), ActionOutcome::WouldConverge);
        assert!(
            sink.events
                .iter()
                .any(|e| matches!(e, RecordedEvent::WhyrunAssumption { .. }))
        );
        // The modifier faked a candidate on the current resource.
        assert_eq!(
            p.current_resource.as_ref().unwrap().get_str("candidate"),
            Some("assumed")
        );
    }

    #[test]
    fn upgrade_converges_on_version_drift() {
        let mut p = provider(Some("2.40.0"), Some("2.43.0"));
        let (outcome, sink) = run(&mut p, "upgrade", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Converged);
        assert!(
            sink.applied_descriptions()
                .iter()
                .any(|d| d.contains("upgrade package git from 2.40.0 to 2.43.0"))
        );
    }

    #[test]
    fn upgrade_skips_when_already_at_candidate() {
        let mut p = provider(Some("2.43.0"), Some("2.43.0"));
        let (outcome, _) = run(&mut p, "upgrade", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Skipped);
    }

    #[test]
    fn remove_converges_only_when_installed() {
        let mut p = provider(Some("2.43.0"), None);
        let (outcome, _) = run(&mut p, "remove", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Converged);

        let mut p = provider(None, None);
        let (outcome, _) = run(&mut p, "remove", false);
        assert_eq!(outcome.unwrap(), ActionOutcome::Skipped);
    }

    #[test]
    fn backend_name_validation_runs_before_probing() {
        let mut p = PackageProvider::new(
            "fake_package",
            Box::new(FakeBackend::new(None, None)),
            ResourceSpec::new("package", ""),
        );
        let (outcome, _) = run(&mut p, "install", false);
        assert!(matches!(
            outcome.unwrap_err(),
            Error::ValidationFailed { .. }
        ));
    }
}
