//! Provider resolution.
//!
//! Maps an abstract resource type plus platform facts to exactly one
//! concrete provider descriptor, with deterministic tie-breaking:
//! explicit override, then priority arrays, then
//! most-specific-filter-wins with last-registered breaking ties.

use crate::error::{Error, Result};
use crate::platform::PlatformFacts;
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use crate::resource::ResourceSpec;

/// Resolves resources to providers against one registry and one set of
/// platform facts. Both are read-only and safe to share across
/// sequential resource dispatches.
pub struct ProviderResolver<'a> {
    registry: &'a ProviderRegistry,
    facts: &'a PlatformFacts,
}

impl<'a> ProviderResolver<'a> {
    pub fn new(registry: &'a ProviderRegistry, facts: &'a PlatformFacts) -> Self {
        Self { registry, facts }
    }

    /// Select the provider for `resource`.
    ///
    /// 1. An explicit provider override on the resource bypasses
    ///    resolution entirely.
    /// 2. Candidates are narrowed by static platform filters.
    /// 3. A priority array for the (type, platform) pair, when present,
    ///    is consulted first: literal order, first-probing-true wins.
    /// 4. Otherwise candidates are ranked most-specific-filter-first
    ///    (exact name beats family beats catch-all), ties broken by
    ///    registration order (last registered wins), and the first
    ///    candidate whose dynamic probe passes is chosen.
    pub fn resolve(&self, resource: &ResourceSpec) -> Result<&'a ProviderDescriptor> {
        if let Some(id) = &resource.provider {
            return self
                .registry
                .find_by_id(&resource.type_name, id)
                .ok_or_else(|| Error::ProviderNotFound {
                    resource: format!("{resource} (requested provider `{id}`)"),
                    platform: self.facts.describe(),
                });
        }

        let mut candidates: Vec<&'a ProviderDescriptor> = self
            .registry
            .descriptors(&resource.type_name)
            .iter()
            .filter(|d| d.matches_platform(self.facts))
            .collect();

        if let Some(order) = self
            .registry
            .priority_entries(&resource.type_name, self.facts)
        {
            for id in order {
                if let Some(descriptor) = candidates
                    .iter()
                    .copied()
                    .find(|d| d.id() == *id && d.probe_passes())
                {
                    log::debug!(
                        "resolved {resource} to {} via priority order",
                        descriptor.id()
                    );
                    return Ok(descriptor);
                }
            }
        }

        candidates.sort_by(|a, b| b.rank().cmp(&a.rank()).then(b.seq().cmp(&a.seq())));
        for descriptor in candidates {
            if descriptor.probe_passes() {
                log::debug!("resolved {resource} to {}", descriptor.id());
                return Ok(descriptor);
            }
        }

        Err(Error::ProviderNotFound {
            resource: resource.to_string(),
            platform: self.facts.describe(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as CoreResult;
    use crate::platform::PlatformFilter;
    use crate::provider::Provider;
    use crate::recorder::ConvergeContext;
    use crate::resource::CurrentResourceSpec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Minimal provider; resolution never invokes it.
    struct StubProvider {
        new_resource: ResourceSpec,
    }

    impl Provider for StubProvider {
        fn provider_name(&self) -> &'static str {
            "stub"
        }

        fn new_resource(&self) -> &ResourceSpec {
            &self.new_resource
        }

        fn new_resource_mut(&mut self) -> &mut ResourceSpec {
            &mut self.new_resource
        }

        fn current_resource(&self) -> Option<&CurrentResourceSpec> {
            None
        }

        fn current_resource_mut(&mut self) -> Option<&mut CurrentResourceSpec> {
            None
        }

        fn load_current_resource(&mut self) -> CoreResult<()> {
            Ok(())
        }

        fn dispatch(&mut self, action: &str, _ctx: &mut ConvergeContext<'_>) -> CoreResult<()> {
            Err(self.unsupported_action(action))
        }
    }

    fn descriptor(id: &'static str) -> ProviderDescriptor {
        ProviderDescriptor::new(id, |spec| Box::new(StubProvider { new_resource: spec }))
    }

    fn debian() -> PlatformFacts {
        PlatformFacts::new("debian", "ubuntu", "24.04")
    }

    fn darwin() -> PlatformFacts {
        PlatformFacts::new("darwin", "macos", "15.1")
    }

    fn service() -> ResourceSpec {
        ResourceSpec::new("service", "nginx")
    }

    #[test]
    fn family_filtered_descriptor_beats_catch_all_on_matching_platform() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "service",
            descriptor("debian_service").with_filter(PlatformFilter::new().family("debian")),
        );
        registry.register_provider("service", descriptor("generic_service"));

        let debian = debian();
        let resolved = ProviderResolver::new(&registry, &debian)
            .resolve(&service())
            .unwrap();
        assert_eq!(resolved.id(), "debian_service");

        let darwin = darwin();
        let resolved = ProviderResolver::new(&registry, &darwin)
            .resolve(&service())
            .unwrap();
        assert_eq!(resolved.id(), "generic_service");
    }

    #[test]
    fn specificity_wins_regardless_of_registration_order() {
        // Same registry contents, both orders.
        for reversed in [false, true] {
            let mut registry = ProviderRegistry::new();
            let filtered =
                || descriptor("debian_service").with_filter(PlatformFilter::new().family("debian"));
            if reversed {
                registry.register_provider("service", descriptor("generic_service"));
                registry.register_provider("service", filtered());
            } else {
                registry.register_provider("service", filtered());
                registry.register_provider("service", descriptor("generic_service"));
            }
            let facts = debian();
            let resolved = ProviderResolver::new(&registry, &facts)
                .resolve(&service())
                .unwrap();
            assert_eq!(resolved.id(), "debian_service");
        }
    }

    #[test]
    fn name_match_outranks_family_match() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "service",
            descriptor("family_service").with_filter(PlatformFilter::new().family("debian")),
        );
        registry.register_provider(
            "service",
            descriptor("ubuntu_service").with_filter(PlatformFilter::new().name("ubuntu")),
        );

        let facts = debian();
        let resolved = ProviderResolver::new(&registry, &facts)
            .resolve(&service())
            .unwrap();
        assert_eq!(resolved.id(), "ubuntu_service");
    }

    #[test]
    fn resolution_is_deterministic() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "service",
            descriptor("a").with_filter(PlatformFilter::new().family("debian")),
        );
        registry.register_provider("service", descriptor("b"));
        let facts = debian();
        let resolver = ProviderResolver::new(&registry, &facts);
        let first = resolver.resolve(&service()).unwrap().id();
        let second = resolver.resolve(&service()).unwrap().id();
        assert_eq!(first, second);
    }

    #[test]
    fn negated_filter_matches_everything_but_the_named_platform() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "service",
            descriptor("not_aix").with_filter(PlatformFilter::new().family("!aix")),
        );

        let facts = debian();
        assert!(
            ProviderResolver::new(&registry, &facts)
                .resolve(&service())
                .is_ok()
        );

        let aix = PlatformFacts::new("aix", "aix", "7.2");
        let err = ProviderResolver::new(&registry, &aix)
            .resolve(&service())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("service[nginx]"));
        assert!(msg.contains("aix"));
    }

    #[test]
    fn ties_at_equal_specificity_go_to_last_registered() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "service",
            descriptor("builtin").with_filter(PlatformFilter::new().family("debian")),
        );
        registry.register_provider(
            "service",
            descriptor("plugin").with_filter(PlatformFilter::new().family("debian")),
        );
        let facts = debian();
        let resolved = ProviderResolver::new(&registry, &facts)
            .resolve(&service())
            .unwrap();
        assert_eq!(resolved.id(), "plugin");
    }

    #[test]
    fn failing_probe_excludes_a_descriptor() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "package",
            descriptor("homebrew_package")
                .with_filter(PlatformFilter::new().family("darwin"))
                .with_probe(|| false),
        );
        registry.register_provider("package", descriptor("generic_package"));

        let facts = darwin();
        let resolved = ProviderResolver::new(&registry, &facts)
            .resolve(&ResourceSpec::new("package", "git"))
            .unwrap();
        assert_eq!(resolved.id(), "generic_package");
    }

    #[test]
    fn probes_run_at_resolution_time() {
        let probed = Arc::new(AtomicBool::new(false));
        let probed2 = Arc::clone(&probed);
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "package",
            descriptor("probed_package").with_probe(move || {
                probed2.store(true, Ordering::SeqCst);
                true
            }),
        );
        let facts = debian();
        ProviderResolver::new(&registry, &facts)
            .resolve(&ResourceSpec::new("package", "git"))
            .unwrap();
        assert!(probed.load(Ordering::SeqCst));
    }

    #[test]
    fn priority_array_is_consulted_before_specificity() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "package",
            descriptor("apt_package").with_filter(PlatformFilter::new().family("debian")),
        );
        registry.register_provider("package", descriptor("generic_package"));
        // Specificity alone would pick apt_package on debian.
        registry.register_priority(
            "package",
            &["generic_package", "apt_package"],
            Some(PlatformFilter::new().family("debian")),
        );

        let facts = debian();
        let resolved = ProviderResolver::new(&registry, &facts)
            .resolve(&ResourceSpec::new("package", "git"))
            .unwrap();
        assert_eq!(resolved.id(), "generic_package");
    }

    #[test]
    fn priority_array_skips_entries_that_fail_probes() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider("package", descriptor("first_choice").with_probe(|| false));
        registry.register_provider("package", descriptor("second_choice"));
        registry.register_priority("package", &["first_choice", "second_choice"], None);

        let facts = debian();
        let resolved = ProviderResolver::new(&registry, &facts)
            .resolve(&ResourceSpec::new("package", "git"))
            .unwrap();
        assert_eq!(resolved.id(), "second_choice");
    }

    #[test]
    fn priority_entry_for_other_platforms_is_ignored() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "package",
            descriptor("apt_package").with_filter(PlatformFilter::new().family("debian")),
        );
        registry.register_provider("package", descriptor("generic_package"));
        registry.register_priority(
            "package",
            &["generic_package"],
            Some(PlatformFilter::new().family("darwin")),
        );

        let facts = debian();
        let resolved = ProviderResolver::new(&registry, &facts)
            .resolve(&ResourceSpec::new("package", "git"))
            .unwrap();
        assert_eq!(resolved.id(), "apt_package");
    }

    #[test]
    fn explicit_provider_override_bypasses_filters() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "service",
            descriptor("darwin_service").with_filter(PlatformFilter::new().family("darwin")),
        );
        registry.register_provider("service", descriptor("generic_service"));

        let facts = debian();
        let resource = service().with_provider("darwin_service");
        let resolved = ProviderResolver::new(&registry, &facts)
            .resolve(&resource)
            .unwrap();
        assert_eq!(resolved.id(), "darwin_service");
    }

    #[test]
    fn unknown_explicit_provider_is_an_error() {
        let registry = ProviderRegistry::new();
        let facts = debian();
        let resource = service().with_provider("no_such_provider");
        let err = ProviderResolver::new(&registry, &facts)
            .resolve(&resource)
            .unwrap_err();
        assert!(err.to_string().contains("no_such_provider"));
    }

    #[test]
    fn no_matching_descriptor_names_type_and_platform() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(
            "service",
            descriptor("darwin_service").with_filter(PlatformFilter::new().family("darwin")),
        );
        let facts = debian();
        let err = ProviderResolver::new(&registry, &facts)
            .resolve(&service())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("service[nginx]"));
        assert!(msg.contains("debian/ubuntu 24.04"));
    }
}
