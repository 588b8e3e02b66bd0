//! SysV init backend - service management via /etc/init.d scripts.
//!
//! The filter-free fallback when no better service manager is detected.

use super::{ServiceBackend, ServiceStatus};
use anyhow::{Context, bail};
use std::path::PathBuf;
use std::process::Command;

/// Runs `/etc/init.d/<name> <verb>`.
pub struct SysvInitBackend;

impl SysvInitBackend {
    fn script(&self, name: &str) -> PathBuf {
        PathBuf::from("/etc/init.d").join(name)
    }

    fn run_script(&self, name: &str, verb: &str) -> anyhow::Result<std::process::Output> {
        let script = self.script(name);
        Command::new(&script)
            .arg(verb)
            .output()
            .with_context(|| format!("failed to run {}", script.display()))
    }
}

impl ServiceBackend for SysvInitBackend {
    fn unit_available(&self, name: &str) -> bool {
        self.script(name).is_file()
    }

    fn unit_path(&self, name: &str) -> String {
        format!("init script {}", self.script(name).display())
    }

    fn status(&self, name: &str) -> anyhow::Result<ServiceStatus> {
        let output = self.run_script(name, "status")?;
        if output.status.success() {
            Ok(ServiceStatus::Running)
        } else {
            Ok(ServiceStatus::Stopped)
        }
    }

    fn start(&self, name: &str) -> anyhow::Result<()> {
        let output = self.run_script(name, "start")?;
        if !output.status.success() {
            bail!(
                "{} start failed: {}",
                self.script(name).display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn stop(&self, name: &str) -> anyhow::Result<()> {
        let output = self.run_script(name, "stop")?;
        if !output.status.success() {
            bail!(
                "{} stop failed: {}",
                self.script(name).display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn restart(&self, name: &str) -> anyhow::Result<()> {
        let output = self.run_script(name, "restart")?;
        if !output.status.success() {
            bail!(
                "{} restart failed: {}",
                self.script(name).display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_path_points_into_init_d() {
        let backend = SysvInitBackend;
        assert_eq!(backend.unit_path("nginx"), "init script /etc/init.d/nginx");
    }

    #[test]
    fn unit_availability_tracks_the_script() {
        let backend = SysvInitBackend;
        assert!(!backend.unit_available("definitely-not-a-real-service-xyz"));
    }
}
