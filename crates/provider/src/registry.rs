use std::collections::HashMap;
use std::sync::Arc;

use cadence_core::Channel;

use crate::provider::DynProvider;

/// A registry that maps provider names to their implementations.
///
/// Providers are stored behind `Arc<dyn DynProvider>` so they can be shared
/// across tasks safely. The registry itself is not thread-safe for mutation;
/// it is intended to be built once at startup and then shared as an
/// immutable reference or wrapped in an `Arc`.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn DynProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider. The provider's name (from [`DynProvider::name`])
    /// is used as the lookup key.
    ///
    /// If a provider with the same name already exists, it is replaced.
    pub fn register(&mut self, provider: Arc<dyn DynProvider>) {
        let name = provider.name().to_owned();
        self.providers.insert(name, provider);
    }

    /// Look up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DynProvider>> {
        self.providers.get(name).cloned()
    }

    /// Look up the first provider that delivers on the given channel.
    #[must_use]
    pub fn for_channel(&self, channel: Channel) -> Option<Arc<dyn DynProvider>> {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort_unstable();
        names
            .into_iter()
            .map(|name| &self.providers[name])
            .find(|p| p.channel() == channel)
            .cloned()
    }

    /// Return a sorted list of all registered provider names.
    #[must_use]
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Return the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Return `true` if no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
