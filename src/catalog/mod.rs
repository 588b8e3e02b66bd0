//! Built-in provider catalog.
//!
//! Each provider is an independent, mechanical application of the
//! convergence protocol: probe current state, declare requirements,
//! wrap every mutation in `converge_by`. Platform wiring lives here in
//! one place so no provider needs to know about its competitors.

use convergence::{PlatformFilter, ProviderDescriptor, ProviderRegistry};

pub mod directory;
pub mod file;
pub mod link;
pub mod package;
pub mod service;

/// Whether an executable with the given name is on PATH.
///
/// Used as a resolution-time probe ("can this provider handle the
/// platform right now").
pub fn binary_on_path(name: &str) -> bool {
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths).any(|dir| dir.join(name).is_file())
    })
}

/// Registry of the built-in providers with their platform rules.
pub fn builtin_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    registry.register_provider(
        "file",
        ProviderDescriptor::new("file", |spec| Box::new(file::FileProvider::new(spec))),
    );
    registry.set_default_action("file", "create");

    registry.register_provider(
        "directory",
        ProviderDescriptor::new("directory", |spec| {
            Box::new(directory::DirectoryProvider::new(spec))
        }),
    );
    registry.set_default_action("directory", "create");

    registry.register_provider(
        "link",
        ProviderDescriptor::new("link", |spec| Box::new(link::LinkProvider::new(spec))),
    );
    registry.set_default_action("link", "create");

    registry.register_provider(
        "package",
        ProviderDescriptor::new("apt_package", |spec| {
            Box::new(package::PackageProvider::apt(spec))
        })
        .with_filter(PlatformFilter::new().family("debian")),
    );
    registry.register_provider(
        "package",
        ProviderDescriptor::new("homebrew_package", |spec| {
            Box::new(package::PackageProvider::homebrew(spec))
        })
        .with_filter(PlatformFilter::new().family("darwin"))
        .with_probe(|| binary_on_path("brew")),
    );
    // Homebrew first on darwin even if another package provider is
    // registered for it later.
    registry.register_priority(
        "package",
        &["homebrew_package", "apt_package"],
        Some(PlatformFilter::new().family("darwin")),
    );
    registry.set_default_action("package", "install");

    registry.register_provider(
        "service",
        ProviderDescriptor::new("sysvinit_service", |spec| {
            Box::new(service::ServiceProvider::sysvinit(spec))
        }),
    );
    registry.register_provider(
        "service",
        ProviderDescriptor::new("systemd_service", |spec| {
            Box::new(service::ServiceProvider::systemd(spec))
        })
        .with_filter(PlatformFilter::new().family(["!darwin", "!windows"]))
        .with_probe(|| binary_on_path("systemctl")),
    );
    registry.set_default_action("service", "start");

    registry
}
