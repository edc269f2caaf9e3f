//! Pricing providers
//!
//! Wires catalog clients into pricing adapters and registers them by provider.

pub mod aws;

use domain_estimation::{AdapterRegistry, CatalogPricingAdapter, PricingProfile};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;

pub use aws::AwsOfferCatalog;

/// One adapter per enabled provider
pub fn build_registry(config: &Config) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();

    if config.aws.enabled {
        let profile = PricingProfile::aws().with_max_results(config.aws.max_results);
        let adapter = CatalogPricingAdapter::new(AwsOfferCatalog::new(&config.aws), profile)
            .with_retry_policy(config.estimator.retry_policy())
            .with_init_timeout(config.estimator.query_timeout);
        registry.register(Arc::new(adapter));
    } else {
        info!("AWS pricing disabled");
    }

    registry
}

/// Registry restricted to the named providers; unknown names are skipped
pub fn select(registry: &AdapterRegistry, providers: &[String]) -> AdapterRegistry {
    let mut selected = AdapterRegistry::new();
    for provider in providers {
        match registry.get(provider) {
            Some(adapter) => selected.register(adapter),
            None => warn!(provider = %provider, "No pricing adapter for requested provider"),
        }
    }
    selected
}
