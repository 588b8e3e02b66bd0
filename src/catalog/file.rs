//! File resource provider - manage regular files and their content.

use anyhow::Context;
use convergence::{
    ConvergeContext, CurrentResourceSpec, Error, FailureKind, PropertyDefinition, PropertySchema,
    Provider, ResourceRequirements, ResourceSpec, Result,
};
use std::fs;
use std::path::PathBuf;

/// Manages a regular file: presence, content, mtime.
///
/// Content comparison uses blake3 checksums so large files are never
/// diffed byte-by-byte twice.
#[derive(Debug)]
pub struct FileProvider {
    new_resource: ResourceSpec,
    current_resource: Option<CurrentResourceSpec>,
}

impl FileProvider {
    pub fn new(spec: ResourceSpec) -> Self {
        Self {
            new_resource: spec,
            current_resource: None,
        }
    }

    /// Managed path: the `path` property, defaulting to the resource name.
    fn path(&self) -> PathBuf {
        self.new_resource
            .get_str("path")
            .unwrap_or(&self.new_resource.name)
            .into()
    }

    fn exists(&self) -> bool {
        self.current_resource
            .as_ref()
            .and_then(|c| c.get_bool("exists"))
            .unwrap_or(false)
    }

    fn desired_checksum(&self) -> Option<String> {
        self.new_resource
            .get_str("content")
            .map(|content| blake3::hash(content.as_bytes()).to_hex().to_string())
    }

    fn current_checksum(&self) -> Option<String> {
        self.current_resource
            .as_ref()
            .and_then(|c| c.get_str("checksum"))
            .map(ToString::to_string)
    }

    fn action_create(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        let path = self.path();
        let content = self
            .new_resource
            .get_str("content")
            .unwrap_or_default()
            .to_string();

        if !self.exists() {
            ctx.converge_by(format!("create file {}", path.display()), move |_| {
                fs::write(&path, &content)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                Ok(())
            })?;
            return Ok(());
        }

        if let (Some(desired), Some(current)) = (self.desired_checksum(), self.current_checksum()) {
            if desired != current {
                ctx.converge_by(
                    vec![
                        format!("update content of file {}", path.display()),
                        format!("  checksum changed from {current} to {desired}"),
                    ],
                    move |_| {
                        fs::write(&path, &content)
                            .with_context(|| format!("failed to write {}", path.display()))?;
                        Ok(())
                    },
                )?;
            }
        }
        Ok(())
    }

    fn action_delete(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.exists() {
            let path = self.path();
            ctx.converge_by(format!("delete file {}", path.display()), move |_| {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to delete {}", path.display()))?;
                Ok(())
            })?;
        }
        Ok(())
    }

    // Touch always converges: its whole point is bumping the mtime.
    fn action_touch(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        let path = self.path();
        ctx.converge_by(format!("touch file {}", path.display()), move |_| {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            file.set_modified(std::time::SystemTime::now())
                .with_context(|| format!("failed to touch {}", path.display()))?;
            Ok(())
        })?;
        Ok(())
    }
}

impl Provider for FileProvider {
    fn provider_name(&self) -> &'static str {
        "file"
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
                .property("content", PropertyDefinition::string()),
        )
    }

    fn load_current_resource(&mut self) -> Result<()> {
        let path = self.path();
        let mut current = ResourceSpec::new("file", &self.new_resource.name);
        match fs::symlink_metadata(&path) {
            Ok(md) if md.is_file() => {
                current.set("exists", true);
                let contents = fs::read(&path).map_err(|e| Error::ProbeFailed {
                    resource: self.new_resource.to_string(),
                    message: e.to_string(),
                })?;
                current.set("checksum", blake3::hash(&contents).to_hex().to_string());
            }
            Ok(_) => {
                return Err(Error::ProbeFailed {
                    resource: self.new_resource.to_string(),
                    message: format!("{} exists but is not a regular file", path.display()),
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
        let parent = path.parent().map(PathBuf::from).unwrap_or_default();
        let resource = self.new_resource.to_string();

        let probe_parent = parent.clone();
        requirements.assert(&["create", "touch"], move |a| {
            a.assertion(move || probe_parent.as_os_str().is_empty() || probe_parent.is_dir());
            a.failure_message(
                FailureKind::ParentDirectoryMissing,
                format!(
                    "cannot create file {}: parent directory {} does not exist",
                    resource,
                    parent.display()
                ),
            );
            a.whyrun(format!(
                "Assuming parent directory {} would have been created",
                parent.display()
            ));
        });

        // Deleting an unwritable file fails even in why-run mode; there
        // is no safe assumption to make about permissions.
        let delete_path = path.clone();
        let resource = self.new_resource.to_string();
        requirements.assert(&["delete"], move |a| {
            a.assertion(move || {
                !delete_path.exists()
                    || fs::metadata(&delete_path)
                        .map(|md| !md.permissions().readonly())
                        .unwrap_or(false)
            });
            a.failure_message(
                FailureKind::InsufficientPrivileges,
                format!("insufficient privileges to delete {resource}"),
            );
        });
    }

    fn dispatch(&mut self, action: &str, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        match action {
            "create" => self.action_create(ctx),
            "delete" => self.action_delete(ctx),
            "touch" => self.action_touch(ctx),
            other => Err(self.unsupported_action(other)),
        }
    }
}
