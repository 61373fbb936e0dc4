//! Authorization cache for off-host transaction events.
//!
//! Off-host transaction events (a remote reader talking to a secure
//! element) are only surfaced to packages holding the corresponding
//! permission. The event loop keeps a cached set of those package names
//! and attaches it to every transaction event; the cache is rebuilt from
//! the [`PackageRegistry`] collaborator on startup and whenever the
//! embedder reports package churn.

use std::collections::BTreeSet;

/// Source of truth for which packages may receive transaction events.
pub trait PackageRegistry: Send + Sync {
    /// All package names currently holding the transaction-event
    /// permission.
    fn packages_with_event_permission(&self) -> Vec<String>;
}

/// Registry over a fixed package list. Useful for tests and for embedders
/// without a package manager.
#[derive(Debug, Default)]
pub struct StaticPackageRegistry {
    packages: Vec<String>,
}

impl StaticPackageRegistry {
    /// Create a registry that always reports the given packages.
    pub fn new(packages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        StaticPackageRegistry {
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }
}

impl PackageRegistry for StaticPackageRegistry {
    fn packages_with_event_permission(&self) -> Vec<String> {
        self.packages.clone()
    }
}

/// The cached authorization set.
#[derive(Debug, Default)]
pub(crate) struct PackageCache {
    packages: BTreeSet<String>,
}

impl PackageCache {
    /// Replace the cache contents from the registry.
    pub(crate) fn refresh(&mut self, registry: &dyn PackageRegistry) {
        self.packages = registry
            .packages_with_event_permission()
            .into_iter()
            .collect();
    }

    /// Whether no package is authorized.
    pub(crate) fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// The authorized packages, sorted.
    pub(crate) fn authorized(&self) -> Vec<String> {
        self.packages.iter().cloned().collect()
    }
}
