//! APT backend - Debian-family package management via dpkg/apt.

use super::PackageBackend;
use anyhow::{Context, bail};
use std::process::Command;

/// Shells out to `dpkg-query`, `apt-cache` and `apt-get`.
pub struct AptBackend;

impl AptBackend {
    fn parse_candidate(policy_output: &str) -> Option<String> {
        policy_output
            .lines()
            .find_map(|line| line.trim().strip_prefix("Candidate:"))
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty() && *candidate != "(none)")
            .map(ToString::to_string)
    }
}

impl PackageBackend for AptBackend {
    // dpkg package names are lowercase alphanumerics plus +-. and must
    // not contain whitespace.
    fn validate_name(&self, name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("package name must not be empty".into());
        }
        if name.chars().any(char::is_whitespace) {
            return Err(format!("invalid apt package name `{name}`: contains whitespace"));
        }
        if name.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(format!(
                "invalid apt package name `{name}`: dpkg package names are lowercase"
            ));
        }
        Ok(())
    }

    fn installed_version(&self, name: &str) -> anyhow::Result<Option<String>> {
        let output = Command::new("dpkg-query")
            .args(["-W", "-f=${db:Status-Status} ${Version}", name])
            .output()
            .context("failed to run dpkg-query")?;
        if !output.status.success() {
            // dpkg-query exits non-zero for unknown packages
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.trim().split_once(' ') {
            Some(("installed", version)) if !version.is_empty() => Ok(Some(version.to_string())),
            _ => Ok(None),
        }
    }

    fn candidate_version(&self, name: &str) -> anyhow::Result<Option<String>> {
        let output = Command::new("apt-cache")
            .args(["policy", name])
            .output()
            .context("failed to run apt-cache policy")?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Self::parse_candidate(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    fn install(&self, name: &str, version: Option<&str>) -> anyhow::Result<()> {
        let spec = match version {
            Some(v) => format!("{name}={v}"),
            None => name.to_string(),
        };
        let output = Command::new("apt-get")
            .args(["install", "-y", &spec])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .context("failed to run apt-get install")?;
        if !output.status.success() {
            bail!(
                "apt-get install {} failed: {}",
                spec,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        let output = Command::new("apt-get")
            .args(["remove", "-y", name])
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .context("failed to run apt-get remove")?;
        if !output.status.success() {
            bail!(
                "apt-get remove {} failed: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
