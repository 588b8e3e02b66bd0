//! systemd backend - service management via `systemctl`.

use super::{ServiceBackend, ServiceStatus};
use anyhow::{Context, bail};
use std::process::Command;

/// Shells out to `systemctl`.
pub struct SystemdBackend;

impl SystemdBackend {
    fn systemctl(&self, args: &[&str]) -> anyhow::Result<std::process::Output> {
        Command::new("systemctl")
            .args(args)
            .output()
            .context("failed to run systemctl")
    }
}

impl ServiceBackend for SystemdBackend {
    fn unit_available(&self, name: &str) -> bool {
        self.systemctl(&["show", "-p", "LoadState", "--value", name])
            .map(|output| {
                output.status.success()
                    && String::from_utf8_lossy(&output.stdout).trim() == "loaded"
            })
            .unwrap_or(false)
    }

    fn unit_path(&self, name: &str) -> String {
        format!("unit {name}.service")
    }

    fn status(&self, name: &str) -> anyhow::Result<ServiceStatus> {
        // is-active exits non-zero for inactive units; that is a normal
        // answer, not a probe failure.
        let output = self.systemctl(&["is-active", name])?;
        if output.status.success() {
            Ok(ServiceStatus::Running)
        } else {
            Ok(ServiceStatus::Stopped)
        }
    }

    fn start(&self, name: &str) -> anyhow::Result<()> {
        let output = self.systemctl(&["start", name])?;
        if !output.status.success() {
            bail!(
                "systemctl start {} failed: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn stop(&self, name: &str) -> anyhow::Result<()> {
        let output = self.systemctl(&["stop", name])?;
        if !output.status.success() {
            bail!(
                "systemctl stop {} failed: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn restart(&self, name: &str) -> anyhow::Result<()> {
        let output = self.systemctl(&["restart", name])?;
        if !output.status.success() {
            bail!(
                "systemctl restart {} failed: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
