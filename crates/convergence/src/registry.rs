//! Provider registry.
//!
//! An explicit, constructed-once mapping from resource type to candidate
//! provider descriptors. Owned by the orchestrator and handed to the
//! resolver by reference: register once at startup, read-only during
//! runs.

use crate::platform::{PlatformFacts, PlatformFilter};
use crate::provider::Provider;
use crate::resource::ResourceSpec;
use std::collections::HashMap;
use std::fmt;

/// Zero-argument "can I handle this platform right now" probe.
pub type ProbeFn = dyn Fn() -> bool + Send + Sync;

/// Builds a provider instance for one resource.
pub type ProviderFactory = dyn Fn(ResourceSpec) -> Box<dyn Provider> + Send + Sync;

/// One registry entry: a provider implementation plus its
/// platform-applicability rules.
pub struct ProviderDescriptor {
    id: &'static str,
    filter: Option<PlatformFilter>,
    probe: Option<Box<ProbeFn>>,
    factory: Box<ProviderFactory>,
    seq: usize,
}

impl ProviderDescriptor {
    pub fn new(
        id: &'static str,
        factory: impl Fn(ResourceSpec) -> Box<dyn Provider> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            filter: None,
            probe: None,
            factory: Box::new(factory),
            seq: 0,
        }
    }

    /// Static platform constraints; a descriptor without a filter
    /// matches every platform (catch-all).
    pub fn with_filter(mut self, filter: PlatformFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Dynamic probe evaluated at resolution time (e.g. "binary on
    /// PATH"). Descriptors without a probe always apply once statically
    /// matched.
    pub fn with_probe(mut self, probe: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Construct the provider for one resource.
    pub fn instantiate(&self, spec: ResourceSpec) -> Box<dyn Provider> {
        (self.factory)(spec)
    }

    pub(crate) fn matches_platform(&self, facts: &PlatformFacts) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(facts))
    }

    pub(crate) fn probe_passes(&self) -> bool {
        self.probe.as_ref().is_none_or(|p| p())
    }

    // Specificity: a descriptor with a probe outranks probe-less ones at
    // equal filter specificity, mirroring the filter dimension order.
    pub(crate) fn rank(&self) -> (u8, (u8, u8, u8)) {
        let probe = u8::from(self.probe.is_some());
        let filter = self.filter.as_ref().map_or((0, 0, 0), PlatformFilter::rank);
        (probe, filter)
    }

    pub(crate) fn seq(&self) -> usize {
        self.seq
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("probe", &self.probe.is_some())
            .field("seq", &self.seq)
            .finish()
    }
}

struct PriorityEntry {
    order: Vec<&'static str>,
    filter: Option<PlatformFilter>,
}

/// Mapping from resource type to candidate providers, priority arrays,
/// and default actions.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Vec<ProviderDescriptor>>,
    priorities: HashMap<String, Vec<PriorityEntry>>,
    default_actions: HashMap<String, String>,
    next_seq: usize,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider descriptor for a resource type. Registration
    /// order is remembered: at equal specificity the last registered
    /// descriptor wins, so later-loaded providers can override
    /// built-ins.
    pub fn register_provider(&mut self, resource_type: &str, mut descriptor: ProviderDescriptor) {
        descriptor.seq = self.next_seq;
        self.next_seq += 1;
        self.providers
            .entry(resource_type.to_string())
            .or_default()
            .push(descriptor);
    }

    /// Register an explicit priority order for a (resource type,
    /// platform-selector) pair. When a priority entry applies, its
    /// provider ids are tried in literal order and the first one that
    /// statically matches and probes true wins.
    pub fn register_priority(
        &mut self,
        resource_type: &str,
        order: &[&'static str],
        filter: Option<PlatformFilter>,
    ) {
        self.priorities
            .entry(resource_type.to_string())
            .or_default()
            .push(PriorityEntry {
                order: order.to_vec(),
                filter,
            });
    }

    /// Default action for resources of this type that request none.
    pub fn set_default_action(&mut self, resource_type: &str, action: &str) {
        self.default_actions
            .insert(resource_type.to_string(), action.to_string());
    }

    pub fn default_action(&self, resource_type: &str) -> Option<&str> {
        self.default_actions.get(resource_type).map(String::as_str)
    }

    /// All descriptors registered for a resource type.
    pub fn descriptors(&self, resource_type: &str) -> &[ProviderDescriptor] {
        self.providers
            .get(resource_type)
            .map_or(&[], Vec::as_slice)
    }

    /// Look a descriptor up by id, ignoring platform rules (used for
    /// explicit provider overrides).
    pub fn find_by_id(&self, resource_type: &str, id: &str) -> Option<&ProviderDescriptor> {
        self.descriptors(resource_type)
            .iter()
            .find(|d| d.id == id)
    }

    pub(crate) fn priority_entries(
        &self,
        resource_type: &str,
        facts: &PlatformFacts,
    ) -> Option<&[&'static str]> {
        self.priorities.get(resource_type).and_then(|entries| {
            entries
                .iter()
                .find(|e| e.filter.as_ref().is_none_or(|f| f.matches(facts)))
                .map(|e| e.order.as_slice())
        })
    }
}
