//! # Convergence
//!
//! The resource/provider convergence core: declare desired state,
//! resolve a platform-appropriate provider, probe current state, and
//! apply the minimal change to converge — idempotently, with a why-run
//! mode that narrates changes instead of performing them.
//!
//! ## Core Concepts
//!
//! - **ResourceSpec**: desired state for one manageable entity
//! - **ProviderRegistry / ProviderResolver**: platform-aware dispatch
//!   from resource type to a concrete provider
//! - **ResourceRequirements**: per-action preconditions with why-run
//!   narratives
//! - **ConvergeContext**: records and performs (or only narrates)
//!   state-changing operations
//! - **run_action**: the per-resource lifecycle state machine
//!
//! ## Example
//!
//! ```ignore
//! use convergence::{
//!     ConvergeContext, PlatformFacts, Provider, ProviderDescriptor,
//!     ProviderRegistry, ProviderResolver, ResourceSpec, RunContext,
//!     NullEventSink, run_action,
//! };
//!
//! let mut registry = ProviderRegistry::new();
//! registry.register_provider(
//!     "file",
//!     ProviderDescriptor::new("file", |spec| Box::new(FileProvider::new(spec))),
//! );
//!
//! let facts = PlatformFacts::new("debian", "ubuntu", "24.04");
//! let resource = ResourceSpec::new("file", "/tmp/motd")
//!     .with_property("content", "hello")
//!     .with_action("create");
//!
//! let descriptor = ProviderResolver::new(&registry, &facts).resolve(&resource)?;
//! let mut provider = descriptor.instantiate(resource);
//! let mut sink = NullEventSink;
//! let outcome = run_action(provider.as_mut(), "create", &mut RunContext::new(false, &mut sink))?;
//! ```
//!
//! ## Run modes
//!
//! The why-run flag on [`RunContext`] is set once before a run. Provider
//! code is identical in both modes: failed requirements are either
//! raised (normal) or narrated-and-assumed (why-run, when a narrative
//! was declared), and `converge_by` either executes or only describes
//! its block.
//!
//! Scheduling is single-threaded and strictly sequential; resources
//! converge one at a time in collection order.

pub mod error;
pub mod events;
pub mod platform;
pub mod provider;
pub mod recorder;
pub mod registry;
pub mod requirements;
pub mod resolver;
pub mod resource;

// Re-export main types at crate root
pub use error::{Error, FailureKind, Result};
pub use events::{EventSink, NullEventSink, RecordedEvent, RecordingSink};
pub use platform::{FilterClause, PlatformFacts, PlatformFilter};
pub use provider::{ACTION_NOTHING, ActionOutcome, Provider, RunContext, run_action};
pub use recorder::{ConvergeActions, ConvergeContext, Descriptions};
pub use registry::{ProviderDescriptor, ProviderRegistry};
pub use requirements::{Assertion, ResourceRequirements};
pub use resolver::ProviderResolver;
pub use resource::{
    CurrentResourceSpec, PropertyDefinition, PropertyKind, PropertySchema, ResourceIdent,
    ResourceSpec,
};
