use futures::{StreamExt, stream};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::aggregation::Report;
use crate::error::{EstimationError, EstimationResult, PricingError};
use crate::inference::enrich;
use crate::models::{Declaration, Resource};
use crate::parser::ParserRegistry;
use crate::registry::AdapterRegistry;

/// Default number of resources priced concurrently
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Parse → infer → price → aggregate
#[derive(Debug, Clone)]
pub struct Estimator {
    parsers: ParserRegistry,
    adapters: AdapterRegistry,
    concurrency: usize,
    default_region: Option<String>,
}

impl Estimator {
    pub fn new(parsers: ParserRegistry, adapters: AdapterRegistry) -> Self {
        Self {
            parsers,
            adapters,
            concurrency: DEFAULT_CONCURRENCY,
            default_region: None,
        }
    }

    /// Maximum number of in-flight price resolutions (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Region assigned to resources where none could be inferred
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Estimate the cost of the IaC files at `path`
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn estimate(&self, path: &Path) -> EstimationResult<Report> {
        let parser = self
            .parsers
            .find(path)
            .ok_or_else(|| EstimationError::NoParser(path.to_path_buf()))?;

        info!(parser = parser.name(), "Parsing declarations");
        let declarations = parser.parse(path)?;

        let mut report = self
            .estimate_declarations(parser.name(), declarations)
            .await;
        report.set_metadata("path", path.display().to_string());
        Ok(report)
    }

    /// Like [`Estimator::estimate`], but stops when `shutdown` resolves.
    ///
    /// In-flight catalog queries are dropped; adapters stay usable.
    pub async fn estimate_with_shutdown<F>(&self, path: &Path, shutdown: F) -> EstimationResult<Report>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = shutdown => {
                warn!(path = %path.display(), "Estimation cancelled");
                Err(EstimationError::Cancelled)
            }
            result = self.estimate(path) => result,
        }
    }

    /// Run inference, pricing and aggregation over parsed declarations
    pub async fn estimate_declarations(&self, iac_format: &str, declarations: Vec<Declaration>) -> Report {
        let mut report = Report::new().with_iac_format(iac_format);

        let resources: Vec<Resource> = declarations.iter().map(|d| self.enrich(d)).collect();
        for resource in &resources {
            self.collect_warnings(resource, &mut report);
        }

        info!(
            resources = resources.len(),
            concurrency = self.concurrency,
            "Resolving prices"
        );

        // buffered() keeps declaration order
        let priced: Vec<(Resource, Option<PricingError>)> = stream::iter(resources)
            .map(|resource| self.price(resource))
            .buffered(self.concurrency)
            .collect()
            .await;

        for (resource, error) in priced {
            if let Some(error) = error {
                report.add_error(format!("Failed to price {}: {}", resource.id, error));
            }
            report.add_resource(resource);
        }

        info!(
            resources = report.resources.len(),
            errors = report.errors.len(),
            total_monthly = report.total_monthly,
            "Estimation complete"
        );

        report
    }

    fn enrich(&self, declaration: &Declaration) -> Resource {
        let mut resource = enrich(declaration);
        if resource.region.is_none() {
            resource.region = self.default_region.clone();
        }
        resource
    }

    fn collect_warnings(&self, resource: &Resource, report: &mut Report) {
        if self.adapters.get(&resource.provider).is_none() {
            return;
        }
        if resource.size.is_none() {
            report.add_warning(format!("No size could be inferred for {}", resource.id));
        }
        if resource.region.is_none() {
            report.add_warning(format!(
                "No region could be inferred for {}; using the provider default",
                resource.id
            ));
        }
    }

    async fn price(&self, mut resource: Resource) -> (Resource, Option<PricingError>) {
        let Some(adapter) = self.adapters.get(&resource.provider) else {
            debug!(resource = %resource.id, provider = %resource.provider, "No pricing adapter registered");
            resource.mark_no_adapter();
            return (resource, None);
        };

        match adapter.get_price(&mut resource).await {
            Ok(()) => (resource, None),
            Err(e) => {
                warn!(resource = %resource.id, error = %e, "Failed to price resource");
                (resource, Some(e))
            }
        }
    }
}
