//! Symlink resource provider.

use anyhow::Context;
use convergence::{
    ConvergeContext, CurrentResourceSpec, Error, PropertyDefinition, PropertySchema, Provider,
    ResourceSpec, Result,
};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
fn make_symlink(to: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(to, link)
}

#[cfg(windows)]
fn make_symlink(to: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(to, link)
}

/// Manages a symbolic link at the resource name, pointing at `to`.
#[derive(Debug)]
pub struct LinkProvider {
    new_resource: ResourceSpec,
    current_resource: Option<CurrentResourceSpec>,
}

impl LinkProvider {
    pub fn new(spec: ResourceSpec) -> Self {
        Self {
            new_resource: spec,
            current_resource: None,
        }
    }

    fn link_path(&self) -> PathBuf {
        PathBuf::from(&self.new_resource.name)
    }

    fn desired_target(&self) -> Option<PathBuf> {
        self.new_resource.get_str("to").map(PathBuf::from)
    }

    fn current_kind(&self) -> &str {
        self.current_resource
            .as_ref()
            .and_then(|c| c.get_str("kind"))
            .unwrap_or("absent")
    }

    fn current_target(&self) -> Option<PathBuf> {
        self.current_resource
            .as_ref()
            .and_then(|c| c.get_str("target"))
            .map(PathBuf::from)
    }

    fn action_create(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        let link = self.link_path();
        let to = self.desired_target().unwrap_or_default();

        match self.current_kind() {
            "symlink" if self.current_target().as_deref() == Some(to.as_path()) => Ok(()),
            "symlink" => {
                let description = format!(
                    "update symlink {} to point to {}",
                    link.display(),
                    to.display()
                );
                ctx.converge_by(description, move |_| {
                    fs::remove_file(&link)
                        .with_context(|| format!("failed to unlink {}", link.display()))?;
                    make_symlink(&to, &link)
                        .with_context(|| format!("failed to link {}", link.display()))?;
                    Ok(())
                })?;
                Ok(())
            }
            "file" => {
                // One conceptual change, two steps worth narrating.
                let descriptions = vec![
                    format!("unlink existing file at {}", link.display()),
                    format!("create symlink {} -> {}", link.display(), to.display()),
                ];
                ctx.converge_by(descriptions, move |_| {
                    fs::remove_file(&link)
                        .with_context(|| format!("failed to unlink {}", link.display()))?;
                    make_symlink(&to, &link)
                        .with_context(|| format!("failed to link {}", link.display()))?;
                    Ok(())
                })?;
                Ok(())
            }
            _ => {
                let description =
                    format!("create symlink {} -> {}", link.display(), to.display());
                ctx.converge_by(description, move |_| {
                    make_symlink(&to, &link)
                        .with_context(|| format!("failed to link {}", link.display()))?;
                    Ok(())
                })?;
                Ok(())
            }
        }
    }

    fn action_delete(&mut self, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.current_kind() != "symlink" {
            return Ok(());
        }
        let link = self.link_path();
        ctx.converge_by(format!("delete symlink {}", link.display()), move |_| {
            fs::remove_file(&link)
                .with_context(|| format!("failed to unlink {}", link.display()))?;
            Ok(())
        })?;
        Ok(())
    }
}

impl Provider for LinkProvider {
    fn provider_name(&self) -> &'static str {
        "link"
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
                .property("to", PropertyDefinition::string().required_for(&["create"])),
        )
    }

    fn load_current_resource(&mut self) -> Result<()> {
        let link = self.link_path();
        let mut current = ResourceSpec::new("link", &self.new_resource.name);
        match fs::symlink_metadata(&link) {
            Ok(md) if md.file_type().is_symlink() => {
                current.set("kind", "symlink");
                let target = fs::read_link(&link).map_err(|e| Error::ProbeFailed {
                    resource: self.new_resource.to_string(),
                    message: e.to_string(),
                })?;
                current.set("target", target.to_string_lossy().to_string());
            }
            Ok(md) if md.is_file() => {
                current.set("kind", "file");
            }
            Ok(_) => {
                return Err(Error::ProbeFailed {
                    resource: self.new_resource.to_string(),
                    message: format!(
                        "{} exists and is neither a symlink nor a regular file",
                        link.display()
                    ),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                current.set("kind", "absent");
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

    fn dispatch(&mut self, action: &str, ctx: &mut ConvergeContext<'_>) -> Result<()> {
        match action {
            "create" => self.action_create(ctx),
            "delete" => self.action_delete(ctx),
            other => Err(self.unsupported_action(other)),
        }
    }
}
