//! Directory resource provider.

use anyhow::Context;
use convergence::{
    ConvergeContext, CurrentResourceSpec, Error, FailureKind, PropertyDefinition, PropertySchema,
    Provider, ResourceRequirements, ResourceSpec, Result,
};
use std::fs;
use std::path::PathBuf;

/// Manages a directory: presence, with optional recursive create/delete.
#[derive(Debug)]
pub struct DirectoryProvider {
    new_resource: ResourceSpec,
    current_resource: Option<CurrentResourceSpec>,
}

impl DirectoryProvider {
    pub fn new(spec: ResourceSpec) -> Self {
        Self {
            new_resource: spec,
            current_resource: None,
        }
    }

    fn path(&self) -> PathBuf {
        self.new_resource
            .get_str("path")
            .unwrap_or(&self.new_resource.name)
            .into()
    }

    fn recursive(&self) -> bool {
        self.new_resource.get_bool("recursive").unwrap_or(false)
    }

    fn exists(&self) -> bool {
        self.current_resource
            .as_ref()
            .and_then(|c| c.get_bool("exists"))
            .unwrap_or(false)
    }

    fn action_create(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.exists() {
            return Ok(());
        }
        let path = self.path();
        let recursive = self.recursive();
        ctx.converge_by(format!("create directory {}", path.display()), move |_| {
            let result = if recursive {
                fs::create_dir_all(&path)
            } else {
                fs::create_dir(&path)
            };
            match result {
                Ok(()) => Ok(()),
                // Another converge run may have created the path between
                // our probe and now; check-then-create is not atomic
                // across processes.
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
                Err(e) => Err(anyhow::Error::from(e)
                    .context(format!("failed to create {}", path.display()))
                    .into()),
            }
        })?;
        Ok(())
    }

    fn action_delete(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        if !self.exists() {
            return Ok(());
        }
        let path = self.path();
        let recursive = self.recursive();
        ctx.converge_by(format!("delete directory {}", path.display()), move |_| {
            if recursive {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("failed to delete {}", path.display()))?;
            } else {
                fs::remove_dir(&path)
                    .with_context(|| format!("failed to delete {}", path.display()))?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

impl Provider for DirectoryProvider {
    fn provider_name(&self) -> &'static str {
        "directory"
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
        Some(
            PropertySchema::new()
                .property("path", PropertyDefinition::string())
                .property("recursive", PropertyDefinition::boolean().with_default(false)),
        )
    }

    fn load_current_resource(&mut self) -> Result<()> {
        let path = self.path();
        let mut current = ResourceSpec::new("directory", &self.new_resource.name);
        match fs::metadata(&path) {
            Ok(md) if md.is_dir() => {
                current.set("exists", true);
            }
            Ok(_) => {
                return Err(Error::ProbeFailed {
                    resource: self.new_resource.to_string(),
                    message: format!("{} exists but is not a directory", path.display()),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                current.set("exists", false);
            }
            Err(e) => {
                return Err(Error::ProbeFailed {
                    resource: self.new_resource.to_string(),
                    message: e.to_string(),
                });
            }
        }
        self.current_resource = Some(current);
        Ok(())
    }

    fn define_resource_requirements(&mut self, requirements: &mut ResourceRequirements) {
        let path = self.path();
        let resource = self.new_resource.to_string();

        if !self.recursive() {
            let parent = path.parent().map(PathBuf::from).unwrap_or_default();
            let probe_parent = parent.clone();
            let create_resource = resource.clone();
            requirements.assert(&["create"], move |a| {
                a.assertion(move || probe_parent.as_os_str().is_empty() || probe_parent.is_dir());
                a.failure_message(
                    FailureKind::ParentDirectoryMissing,
                    format!(
                        "cannot create {}: parent directory {} does not exist (set recursive to create it)",
                        create_resource,
                        parent.display()
                    ),
                );
                a.whyrun(format!(
                    "Assuming parent directory {} would have been created",
                    parent.display()
                ));
            });

            // A non-empty directory cannot be deleted without recursive;
            // no why-run assumption makes that safe.
            let delete_path = path.clone();
            requirements.assert(&["delete"], move |a| {
                a.assertion(move || {
                    fs::read_dir(&delete_path)
                        .map(|mut entries| entries.next().is_none())
                        .unwrap_or(true)
                });
                a.failure_message(
                    FailureKind::Assertion,
                    format!("cannot delete {resource}: directory is not empty (set recursive to delete it)"),
                );
            });
        }
    }

    fn dispatch(&mut self, action: &str, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        match action {
            "create" => self.action_create(ctx),
            "delete" => self.action_delete(ctx),
            other => Err(self.unsupported_action(other)),
        }
    }
}
