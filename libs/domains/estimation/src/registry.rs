//! Registry of pricing adapters, one per provider

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::resolver::{AdapterState, PricingAdapter};

#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn PricingAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its provider, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn PricingAdapter>) {
        let provider = adapter.provider().to_string();
        debug!(provider = %provider, adapter = adapter.name(), "Registered pricing adapter");
        self.adapters.insert(provider, adapter);
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn PricingAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn PricingAdapter>> {
        self.adapters.get(provider).cloned()
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    /// Current lifecycle state of every adapter, ordered by provider
    pub fn states(&self) -> Vec<(String, AdapterState)> {
        self.adapters
            .iter()
            .map(|(provider, adapter)| (provider.clone(), adapter.state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("providers", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
