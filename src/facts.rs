//! Local platform fact detection.
//!
//! Produces the `PlatformFacts` the resolver consumes: OS family, OS
//! name, OS version. On Linux the distribution is read from
//! /etc/os-release; elsewhere the compile-time OS is enough.

use convergence::PlatformFacts;
use std::fs;

/// Detect facts for the host we are running on.
pub fn detect() -> PlatformFacts {
    match std::env::consts::OS {
        "linux" => fs::read_to_string("/etc/os-release")
            .map(|content| parse_os_release(&content))
            .unwrap_or_else(|e| {
                log::debug!("could not read /etc/os-release: {e}");
                PlatformFacts::new("linux", "linux", "unknown")
            }),
        "macos" => PlatformFacts::new("darwin", "macos", macos_version()),
        "windows" => PlatformFacts::new("windows", "windows", "unknown"),
        other => PlatformFacts::new(other, other, "unknown"),
    }
}

fn macos_version() -> String {
    std::process::Command::new("sw_vers")
        .arg("-productVersion")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parse os-release content into facts.
///
/// `ID` is the OS name, `VERSION_ID` the version, and the family is the
/// first entry of `ID_LIKE` (falling back to `ID` for root distros like
/// debian itself).
fn parse_os_release(content: &str) -> PlatformFacts {
    let field = |key: &str| {
        content.lines().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|value| value.trim().trim_matches('"').to_string())
        })
    };

    let name = field("ID").unwrap_or_else(|| "linux".to_string());
    let family = field("ID_LIKE")
        .and_then(|like| {
            like.split_whitespace()
                .next()
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| name.clone());
    let version = field("VERSION_ID").unwrap_or_else(|| "unknown".to_string());

    PlatformFacts::new(family, name, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ubuntu_is_in_the_debian_family() {
        let content = "PRETTY_NAME=\"Ubuntu 24.04.1 LTS\"\nNAME=\"Ubuntu\"\nVERSION_ID=\"24.04\"\nID=ubuntu\nID_LIKE=debian\n";
        let facts = parse_os_release(content);
        assert_eq!(facts.family, "debian");
        assert_eq!(facts.name, "ubuntu");
        assert_eq!(facts.version, "24.04");
    }

    #[test]
    fn root_distros_are_their_own_family() {
        let content = "ID=debian\nVERSION_ID=\"12\"\n";
        let facts = parse_os_release(content);
        assert_eq!(facts.family, "debian");
        assert_eq!(facts.name, "debian");
        assert_eq!(facts.version, "12");
    }

    #[test]
    fn first_id_like_entry_wins() {
        let content = "ID=centos\nID_LIKE=\"rhel fedora\"\nVERSION_ID=\"9\"\n";
        let facts = parse_os_release(content);
        assert_eq!(facts.family, "rhel");
    }

    #[test]
    fn missing_fields_fall_back() {
        let facts = parse_os_release("");
        assert_eq!(facts.name, "linux");
        assert_eq!(facts.family, "linux");
        assert_eq!(facts.version, "unknown");
    }
}
