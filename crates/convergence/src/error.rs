//! Error types for the convergence core.
//!
//! Every fatal condition carries a specific kind and a human-readable
//! message referencing the resource's identity. Assertion failures keep
//! their caller-declared [`FailureKind`] so reporting layers can
//! distinguish "init script missing" from "insufficient privileges"
//! without parsing message strings.

use thiserror::Error;

/// Caller-declared kinds for requirement/assertion failures.
///
/// Providers pick a kind when declaring an assertion's failure message;
/// the default is [`FailureKind::Assertion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Generic precondition failure
    Assertion,
    /// A file the action depends on does not exist
    MissingRequiredFile,
    /// A service's init script or unit is not present
    MissingInitScript,
    /// The current user cannot perform the operation
    InsufficientPrivileges,
    /// The parent directory of a managed path does not exist
    ParentDirectoryMissing,
    /// Package-specific precondition failure
    Package,
    /// Service-specific precondition failure
    Service,
}

impl FailureKind {
    /// Short description of this failure kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Assertion => "precondition not met",
            Self::MissingRequiredFile => "required file missing",
            Self::MissingInitScript => "init script missing",
            Self::InsufficientPrivileges => "insufficient privileges",
            Self::ParentDirectoryMissing => "parent directory missing",
            Self::Package => "package precondition failed",
            Self::Service => "service precondition failed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors surfaced by the convergence core.
#[derive(Debug, Error)]
pub enum Error {
    /// No provider descriptor matched the resource type and platform
    #[error("no provider found for {resource} on platform {platform}")]
    ProviderNotFound {
        /// Resource identity, `type[name]`
        resource: String,
        /// The platform facts that were tried
        platform: String,
    },

    /// A declared requirement failed in normal mode (or in why-run mode
    /// with no narrative to assume it away)
    #[error("{message}")]
    RequirementFailed {
        /// Caller-declared failure kind
        kind: FailureKind,
        /// Caller-declared failure message
        message: String,
    },

    /// A property failed validation before the action ran
    #[error("validation failed for {resource}: {message}")]
    ValidationFailed {
        /// Resource identity, `type[name]`
        resource: String,
        /// What was wrong with the property
        message: String,
    },

    /// The resolved provider does not implement the requested action
    #[error("provider {provider} does not support action `{action}` on {resource}")]
    UnsupportedAction {
        /// Provider id
        provider: String,
        /// The requested action name
        action: String,
        /// Resource identity, `type[name]`
        resource: String,
    },

    /// Loading current state failed (the probe itself, not "entity absent")
    #[error("failed to load current state of {resource}: {message}")]
    ProbeFailed {
        /// Resource identity, `type[name]`
        resource: String,
        /// Underlying probe failure
        message: String,
    },

    /// IO error from a converge block or probe
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other error from provider code
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// The [`FailureKind`] if this is a requirement failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::RequirementFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for convergence operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_failure_displays_declared_message() {
        let err = Error::RequirementFailed {
            kind: FailureKind::MissingInitScript,
            message: "init script /etc/init.d/nginx is missing".into(),
        };
        assert_eq!(err.to_string(), "init script /etc/init.d/nginx is missing");
        assert_eq!(err.failure_kind(), Some(FailureKind::MissingInitScript));
    }

    #[test]
    fn unsupported_action_names_provider_and_action() {
        let err = Error::UnsupportedAction {
            provider: "sysvinit_service".into(),
            action: "reload".into(),
            resource: "service[nginx]".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("sysvinit_service"));
        assert!(msg.contains("reload"));
        assert!(msg.contains("service[nginx]"));
    }
}
