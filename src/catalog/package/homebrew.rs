//! Homebrew backend - package management via `brew` on darwin.

use super::PackageBackend;
use anyhow::{Context, bail};
use serde::Deserialize;
use std::process::Command;

/// Shells out to `brew`, probing state through `brew info --json=v2`.
pub struct BrewBackend;

#[derive(Deserialize)]
struct BrewInfo {
    #[serde(default)]
    formulae: Vec<BrewFormula>,
}

#[derive(Deserialize)]
struct BrewFormula {
    #[serde(default)]
    installed: Vec<BrewInstalled>,
    versions: BrewVersions,
}

#[derive(Deserialize)]
struct BrewInstalled {
    version: String,
}

#[derive(Deserialize)]
struct BrewVersions {
    stable: Option<String>,
}

impl BrewBackend {
    fn info(&self, name: &str) -> anyhow::Result<Option<BrewFormula>> {
        let output = Command::new("brew")
            .args(["info", "--json=v2", "--formula", name])
            .output()
            .context("failed to run brew info")?;
        if !output.status.success() {
            // brew info exits non-zero for unknown formulae
            return Ok(None);
        }
        let info: BrewInfo =
            serde_json::from_slice(&output.stdout).context("failed to parse brew info output")?;
        Ok(info.formulae.into_iter().next())
    }
}

impl PackageBackend for BrewBackend {
    // Formula names may be tap-qualified (owner/tap/name) and casks use
    // mixed case; only whitespace is rejected here. Note this rule is
    // intentionally looser than the apt backend's.
    fn validate_name(&self, name: &str) -> Result<(), String> {
        if name.is_empty() {
            return Err("package name must not be empty".into());
        }
        if name.chars().any(char::is_whitespace) {
            return Err(format!(
                "invalid brew formula name `{name}`: contains whitespace"
            ));
        }
        Ok(())
    }

    fn installed_version(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .info(name)?
            .and_then(|f| f.installed.into_iter().next())
            .map(|i| i.version))
    }

    fn candidate_version(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.info(name)?.and_then(|f| f.versions.stable))
    }

    fn install(&self, name: &str, version: Option<&str>) -> anyhow::Result<()> {
        // Homebrew installs the current stable; version pins are
        // expressed as versioned formulae (e.g. node@20), not flags.
        let spec = match version {
            Some(v) => format!("{name}@{v}"),
            None => name.to_string(),
        };
        let output = Command::new("brew")
            .args(["install", "--formula", &spec])
            .output()
            .context("failed to run brew install")?;
        if !output.status.success() {
            bail!(
                "brew install {} failed: {}",
                spec,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        let output = Command::new("brew")
            .args(["uninstall", "--formula", name])
            .output()
            .context("failed to run brew uninstall")?;
        if !output.status.success() {
            bail!(
                "brew uninstall {} failed: {}",
                name,
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
    fn name_validation_accepts_taps_and_mixed_case() {
        let backend = BrewBackend;
        assert!(backend.validate_name("ripgrep").is_ok());
        assert!(backend.validate_name("homebrew/cask/firefox").is_ok());
        assert!(backend.validate_name("MonitorControl").is_ok());
        assert!(backend.validate_name("rip grep").is_err());
        assert!(backend.validate_name("").is_err());
    }

    #[test]
    fn info_json_parses_installed_and_stable_versions() {
        let payload = r#"{
            "formulae": [{
                "installed": [{"version": "14.1.0"}],
                "versions": {"stable": "14.1.1"}
            }]
        }"#;
        let info: BrewInfo = serde_json::from_str(payload).unwrap();
        let formula = info.formulae.into_iter().next().unwrap();
        assert_eq!(formula.installed[0].version, "14.1.0");
        assert_eq!(formula.versions.stable.as_deref(), Some("14.1.1"));
    }

    #[test]
    fn info_json_tolerates_uninstalled_formulae() {
        let payload = r#"{"formulae": [{"versions": {"stable": "1.0"}}]}"#;
        let info: BrewInfo = serde_json::from_str(payload).unwrap();
        assert!(info.formulae[0].installed.is_empty());
    }
}
