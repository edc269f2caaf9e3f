//! Price resolution engine
//!
//! A [`PricingAdapter`] turns an enriched [`Resource`] into a price. The
//! catalog-backed implementation runs a fixed ladder against its
//! [`CatalogClient`]:
//!
//! 1. classify the resource type into a service class (no network)
//! 2. tier 1: exact query with every known dimension
//! 3. tier 2: relaxed query with only service and size
//! 4. anomaly correction for calibrated zero-priced SKUs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use strum::{Display, EnumString};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};

use crate::calibration::{CalibrationRule, CalibrationTable};
use crate::catalog::{CatalogClient, ExtractedPrice, PriceQuery, fields, scan_entries};
use crate::error::{CatalogError, PricingError, PricingResult};
use crate::models::{
    Attributes, DEFAULT_CURRENCY, PriceComponent, PricingDetails, PricingStatus, Resource,
};
use crate::retry::{RetryPolicy, with_retry};

/// Default deadline for the adapter handshake
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Broad pricing class of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Compute,
    Database,
    Cache,
}

/// Service kind plus the catalog service code that prices it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClass {
    pub kind: ServiceKind,
    pub code: String,
}

impl ServiceClass {
    pub fn new(kind: ServiceKind, code: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
        }
    }
}

/// Resource type prefix → service class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub prefix: String,
    pub class: ServiceClass,
}

/// Everything provider-specific the catalog adapter needs
#[derive(Debug, Clone, PartialEq)]
pub struct PricingProfile {
    /// Provider prefix of resource types, e.g. "aws"
    pub provider: String,
    /// Name used in diagnostics, e.g. "AWS"
    pub display_name: String,
    /// Pricing source recorded on directly priced resources
    pub source_label: String,
    pub currency: String,
    /// Region used when a resource has none
    pub default_region: Option<String>,
    pub rules: Vec<ClassificationRule>,
    pub calibration: CalibrationTable,
    pub max_results: usize,
}

impl PricingProfile {
    pub fn new(provider: impl Into<String>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            provider: provider.into(),
            source_label: format!("{display_name} Pricing API"),
            display_name,
            currency: DEFAULT_CURRENCY.to_string(),
            default_region: None,
            rules: Vec::new(),
            calibration: CalibrationTable::new(),
            max_results: crate::catalog::DEFAULT_MAX_RESULTS,
        }
    }

    /// AWS: EC2 instances, RDS instances and ElastiCache clusters
    pub fn aws() -> Self {
        Self::new("aws", "AWS")
            .with_default_region("us-east-1")
            .with_rule("aws_instance", ServiceKind::Compute, "AmazonEC2")
            .with_rule("aws_db_instance", ServiceKind::Database, "AmazonRDS")
            .with_rule("aws_elasticache", ServiceKind::Cache, "AmazonElastiCache")
            .with_calibration(CalibrationTable::aws_defaults())
    }

    pub fn with_rule(mut self, prefix: impl Into<String>, kind: ServiceKind, code: impl Into<String>) -> Self {
        self.rules.push(ClassificationRule {
            prefix: prefix.into(),
            class: ServiceClass::new(kind, code),
        });
        self
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = Some(region.into());
        self
    }

    pub fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Longest matching prefix wins
    pub fn classify(&self, resource_type: &str) -> Option<&ServiceClass> {
        self.rules
            .iter()
            .filter(|rule| resource_type.starts_with(rule.prefix.as_str()))
            .max_by_key(|rule| rule.prefix.len())
            .map(|rule| &rule.class)
    }
}

/// Adapter lifecycle. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Uninitialized,
    Ready,
    Failed,
}

/// Prices resources of one provider
#[async_trait]
pub trait PricingAdapter: Send + Sync {
    /// Adapter name used in diagnostics
    fn name(&self) -> &str;

    /// Provider prefix this adapter serves
    fn provider(&self) -> &str;

    /// Currency of the prices this adapter produces
    fn currency(&self) -> &str;

    fn state(&self) -> AdapterState;

    /// Run the handshake at most once; later calls return the cached outcome
    async fn initialize(&self) -> PricingResult<()>;

    /// Price one resource in place.
    ///
    /// On failure the resource is left zero-priced with an `Error: …` pricing
    /// source and the error is returned; it is never otherwise invalidated.
    async fn get_price(&self, resource: &mut Resource) -> PricingResult<()>;
}

/// Price chosen by the ladder, before it is written to the resource
#[derive(Debug, Clone, PartialEq)]
struct Quote {
    hourly: f64,
    unit: Option<String>,
    status: PricingStatus,
    source: String,
    attributes: BTreeMap<String, String>,
}

impl Quote {
    fn from_extracted(price: ExtractedPrice, status: PricingStatus, source: String) -> Self {
        Self {
            hourly: price.amount,
            unit: price.unit,
            status,
            source,
            attributes: price.attributes,
        }
    }

    fn apply_to(self, resource: &mut Resource, currency: &str) {
        resource.apply_hourly_price(self.hourly);
        resource.pricing_status = self.status;

        let mut details = PricingDetails::new(currency, self.source);
        if let Some(unit) = self.unit {
            details.price_components.push(PriceComponent {
                name: format!("On-Demand {unit}"),
                unit_price: self.hourly,
                units: 1.0,
                total: self.hourly,
            });
        }
        details.metadata = self.attributes;
        resource.pricing_details = Some(details);
    }
}

/// [`PricingAdapter`] backed by a remote pricing catalog
pub struct CatalogPricingAdapter<C> {
    client: C,
    profile: PricingProfile,
    retry: RetryPolicy,
    init_timeout: Duration,
    init: OnceCell<Result<(), CatalogError>>,
}

impl<C: CatalogClient> CatalogPricingAdapter<C> {
    pub fn new(client: C, profile: PricingProfile) -> Self {
        Self {
            client,
            profile,
            retry: RetryPolicy::default(),
            init_timeout: DEFAULT_INIT_TIMEOUT,
            init: OnceCell::new(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn profile(&self) -> &PricingProfile {
        &self.profile
    }

    fn unavailable(&self, err: &CatalogError) -> PricingError {
        PricingError::Unavailable {
            provider: self.profile.display_name.clone(),
            reason: format!("{} API access failed: {}", self.profile.display_name, err),
        }
    }

    /// Filters every tier-1 query carries for a service kind
    fn mandatory_dimensions(kind: ServiceKind, properties: &Attributes) -> Vec<(&'static str, String)> {
        match kind {
            ServiceKind::Compute => vec![
                (fields::OPERATING_SYSTEM, "Linux".to_string()),
                (fields::TENANCY, "Shared".to_string()),
                (fields::PRE_INSTALLED_SW, "NA".to_string()),
                (fields::CAPACITY_STATUS, "Used".to_string()),
            ],
            ServiceKind::Database => {
                let engine = properties
                    .get("engine")
                    .and_then(|v| v.as_str())
                    .unwrap_or("mysql");
                let multi_az = properties
                    .get("multi_az")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                vec![
                    (fields::DATABASE_ENGINE, database_engine(engine)),
                    (
                        fields::DEPLOYMENT_OPTION,
                        if multi_az { "Multi-AZ" } else { "Single-AZ" }.to_string(),
                    ),
                ]
            }
            ServiceKind::Cache => {
                let engine = properties
                    .get("engine")
                    .and_then(|v| v.as_str())
                    .unwrap_or("redis");
                vec![(fields::CACHE_ENGINE, cache_engine(engine))]
            }
        }
    }

    fn exact_query(
        &self,
        class: &ServiceClass,
        region: Option<&str>,
        size: Option<&str>,
        properties: &Attributes,
    ) -> PriceQuery {
        let mut query =
            PriceQuery::new(class.code.as_str()).with_max_results(self.profile.max_results);
        if let Some(region) = region {
            query = query.with_filter(fields::REGION, region);
        }
        if let Some(size) = size {
            query = query.with_filter(fields::INSTANCE_TYPE, size);
        }
        for (field, value) in Self::mandatory_dimensions(class.kind, properties) {
            query = query.with_filter(field, value);
        }
        query
    }

    fn relaxed_query(&self, class: &ServiceClass, size: Option<&str>) -> PriceQuery {
        let query =
            PriceQuery::new(class.code.as_str()).with_max_results(self.profile.max_results);
        match size {
            Some(size) => query.with_filter(fields::INSTANCE_TYPE, size),
            None => query,
        }
    }

    /// Copy of `query` with the size filter pointing at another SKU
    fn sibling_query(query: &PriceQuery, sku: &str) -> PriceQuery {
        let mut sibling = query.clone();
        for filter in sibling.filters.iter_mut() {
            if filter.field == fields::INSTANCE_TYPE {
                filter.value = sku.to_string();
            }
        }
        sibling
    }

    /// One query under the retry policy, scanned for a price
    async fn lookup(&self, query: &PriceQuery) -> PricingResult<Option<ExtractedPrice>> {
        if let Err(e) = self.client.prepare(query).await {
            warn!(service = %query.service_code, error = %e, "Catalog warm-up failed, querying anyway");
        }
        let entries = with_retry(&self.retry, || self.client.query(query)).await?;
        debug!(
            service = %query.service_code,
            filters = query.filters.len(),
            entries = entries.len(),
            "Catalog query returned"
        );
        Ok(scan_entries(&entries, &self.profile.currency))
    }

    async fn correct_anomaly(&self, rule: &CalibrationRule, exact: &PriceQuery, quote: &mut Quote) {
        let reference = rule.reference_sku();
        let sibling = Self::sibling_query(exact, &reference);

        match self.lookup(&sibling).await {
            Ok(Some(price)) if price.is_positive() => {
                quote.hourly = price.amount * rule.factor;
                quote.status = PricingStatus::Estimated;
                quote.source = format!(
                    "Estimated: {}% of {} price",
                    (rule.factor * 100.0).round() as i64,
                    reference
                );
                debug!(reference = %reference, hourly = quote.hourly, "Applied calibrated sibling price");
            }
            Ok(_) => {
                debug!(reference = %reference, "Sibling has no positive price, keeping zero");
            }
            Err(e) => {
                warn!(reference = %reference, error = %e, "Sibling lookup failed, keeping zero");
            }
        }
    }

    async fn resolve(&self, resource: &Resource) -> PricingResult<Quote> {
        let class = self
            .profile
            .classify(&resource.resource_type)
            .ok_or_else(|| PricingError::UnsupportedResourceType(resource.resource_type.clone()))?;

        self.initialize().await?;

        let region = resource
            .region
            .as_deref()
            .or(self.profile.default_region.as_deref());
        let size = resource.size.as_deref();

        let exact = self.exact_query(class, region, size, &resource.properties);
        let mut quote = match self.lookup(&exact).await? {
            Some(price) => Quote::from_extracted(
                price,
                PricingStatus::Priced,
                self.profile.source_label.clone(),
            ),
            None if exact.filters.len() > 2 => {
                debug!(resource = %resource.id, "No price on exact query, relaxing filters");
                let relaxed = self.relaxed_query(class, size);
                let price = self
                    .lookup(&relaxed)
                    .await?
                    .ok_or_else(|| PricingError::NoPricingData(resource.id.clone()))?;
                Quote::from_extracted(
                    price,
                    PricingStatus::Relaxed,
                    format!("{} (relaxed filters)", self.profile.source_label),
                )
            }
            None => return Err(PricingError::NoPricingData(resource.id.clone())),
        };

        if quote.hourly <= 0.0 {
            if let Some(rule) = size.and_then(|sku| self.profile.calibration.lookup(&class.code, sku)) {
                self.correct_anomaly(rule, &exact, &mut quote).await;
            }
        }

        Ok(quote)
    }
}

#[async_trait]
impl<C: CatalogClient> PricingAdapter for CatalogPricingAdapter<C> {
    fn name(&self) -> &str {
        self.client.name()
    }

    fn provider(&self) -> &str {
        &self.profile.provider
    }

    fn currency(&self) -> &str {
        &self.profile.currency
    }

    fn state(&self) -> AdapterState {
        match self.init.get() {
            None => AdapterState::Uninitialized,
            Some(Ok(())) => AdapterState::Ready,
            Some(Err(_)) => AdapterState::Failed,
        }
    }

    async fn initialize(&self) -> PricingResult<()> {
        let outcome = self
            .init
            .get_or_init(|| async {
                let result =
                    match tokio::time::timeout(self.init_timeout, self.client.initialize()).await {
                        Ok(result) => result,
                        Err(_) => Err(CatalogError::Timeout(self.init_timeout)),
                    };
                match &result {
                    Ok(()) => info!(provider = %self.profile.provider, "Pricing adapter ready"),
                    Err(e) => error!(
                        provider = %self.profile.provider,
                        error = %e,
                        "Pricing adapter initialization failed"
                    ),
                }
                result
            })
            .await;

        outcome.as_ref().map_err(|e| self.unavailable(e)).copied()
    }

    #[instrument(skip(self, resource), fields(resource = %resource.id, size = ?resource.size, region = ?resource.region))]
    async fn get_price(&self, resource: &mut Resource) -> PricingResult<()> {
        match self.resolve(resource).await {
            Ok(quote) => {
                debug!(hourly = quote.hourly, status = %quote.status, "Resource priced");
                quote.apply_to(resource, &self.profile.currency);
                Ok(())
            }
            Err(e) => {
                resource.mark_failed(&e, &self.profile.currency);
                Err(e)
            }
        }
    }
}

/// Catalog spelling of an RDS engine identifier
fn database_engine(engine: &str) -> String {
    let engine = engine.to_ascii_lowercase();
    let name = match engine.as_str() {
        "postgres" | "postgresql" => "PostgreSQL",
        "mariadb" => "MariaDB",
        "aurora" | "aurora-mysql" => "Aurora MySQL",
        "aurora-postgresql" => "Aurora PostgreSQL",
        e if e.starts_with("oracle") => "Oracle",
        e if e.starts_with("sqlserver") => "SQL Server",
        _ => "MySQL",
    };
    name.to_string()
}

/// Catalog spelling of an ElastiCache engine identifier
fn cache_engine(engine: &str) -> String {
    let name = match engine.to_ascii_lowercase().as_str() {
        "memcached" => "Memcached",
        "valkey" => "Valkey",
        _ => "Redis",
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MockCatalogClient, on_demand_entry};
    use mockall::predicate::always;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn entry(sku: &str, amount: &str) -> serde_json::Value {
        let attributes = BTreeMap::from([("instanceType".to_string(), sku.to_string())]);
        on_demand_entry("SKU1", &attributes, "USD", amount, "Hrs")
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new().with_backoff_unit(Duration::from_millis(1))
    }

    fn ec2_instance(size: &str) -> Resource {
        let mut resource = Resource::new("aws_instance", "web");
        resource.size = Some(size.to_string());
        resource.region = Some("us-east-1".to_string());
        resource
    }

    fn ready_client() -> MockCatalogClient {
        let mut client = MockCatalogClient::new();
        client.expect_name().return_const("AWS");
        client.expect_initialize().returning(|| Ok(()));
        client.expect_prepare().returning(|_| Ok(()));
        client
    }

    fn adapter(client: MockCatalogClient) -> CatalogPricingAdapter<MockCatalogClient> {
        CatalogPricingAdapter::new(client, PricingProfile::aws()).with_retry_policy(fast_retry())
    }

    #[test]
    fn test_classify_longest_prefix() {
        let profile = PricingProfile::aws().with_rule("aws_instance_special", ServiceKind::Cache, "Special");
        assert_eq!(profile.classify("aws_instance").unwrap().code, "AmazonEC2");
        assert_eq!(profile.classify("aws_db_instance").unwrap().kind, ServiceKind::Database);
        assert_eq!(profile.classify("aws_elasticache_cluster").unwrap().code, "AmazonElastiCache");
        assert_eq!(profile.classify("aws_instance_special_x").unwrap().code, "Special");
        assert!(profile.classify("aws_s3_bucket").is_none());
    }

    #[test]
    fn test_exact_query_dimensions() {
        let adapter = adapter(MockCatalogClient::new());
        let class = ServiceClass::new(ServiceKind::Database, "AmazonRDS");
        let mut properties = Attributes::new();
        properties.insert("engine".to_string(), "postgres".into());
        properties.insert("multi_az".to_string(), true.into());

        let query = adapter.exact_query(&class, Some("eu-west-1"), Some("db.t3.micro"), &properties);
        assert_eq!(query.filter_value(fields::REGION), Some("eu-west-1"));
        assert_eq!(query.filter_value(fields::INSTANCE_TYPE), Some("db.t3.micro"));
        assert_eq!(query.filter_value(fields::DATABASE_ENGINE), Some("PostgreSQL"));
        assert_eq!(query.filter_value(fields::DEPLOYMENT_OPTION), Some("Multi-AZ"));

        let relaxed = adapter.relaxed_query(&class, Some("db.t3.micro"));
        assert_eq!(relaxed.filters.len(), 2);
        assert!(relaxed.filter_value(fields::REGION).is_none());
    }

    #[test]
    fn test_engine_names() {
        assert_eq!(database_engine("MySQL"), "MySQL");
        assert_eq!(database_engine("sqlserver-ex"), "SQL Server");
        assert_eq!(database_engine("unknown"), "MySQL");
        assert_eq!(cache_engine("memcached"), "Memcached");
        assert_eq!(cache_engine(""), "Redis");
    }

    #[tokio::test]
    async fn test_tier1_price() {
        let mut client = ready_client();
        client
            .expect_query()
            .withf(|q| {
                q.filter_value(fields::INSTANCE_TYPE) == Some("t2.micro")
                    && q.filter_value(fields::TENANCY) == Some("Shared")
            })
            .times(1)
            .returning(|_| Ok(vec![entry("t2.micro", "0.0116000000")]));

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.micro");
        adapter.get_price(&mut resource).await.unwrap();

        assert_eq!(adapter.state(), AdapterState::Ready);
        assert_eq!(resource.pricing_status, PricingStatus::Priced);
        assert!((resource.hourly_price - 0.0116).abs() < 1e-9);
        assert!((resource.monthly_price - 8.468).abs() < 1e-9);
        assert!((resource.yearly_price - 101.616).abs() < 1e-9);

        let details = resource.pricing_details.unwrap();
        assert_eq!(details.pricing_source, "AWS Pricing API");
        assert_eq!(details.price_components[0].name, "On-Demand Hrs");
        assert_eq!(details.metadata["instanceType"], "t2.micro");
    }

    #[tokio::test]
    async fn test_tier2_relaxed_price() {
        let mut client = ready_client();
        let mut seq = mockall::Sequence::new();
        client
            .expect_query()
            .withf(|q| q.filters.len() > 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));
        client
            .expect_query()
            .withf(|q| q.filters.len() == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![entry("t2.micro", "0.0116")]));

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.micro");
        adapter.get_price(&mut resource).await.unwrap();

        assert_eq!(resource.pricing_status, PricingStatus::Relaxed);
        assert_eq!(
            resource.pricing_details.unwrap().pricing_source,
            "AWS Pricing API (relaxed filters)"
        );
    }

    #[tokio::test]
    async fn test_no_pricing_data_after_both_tiers() {
        let mut client = ready_client();
        client.expect_query().times(2).returning(|_| Ok(vec![serde_json::json!({"terms": {}})]));

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.micro");
        let err = adapter.get_price(&mut resource).await.unwrap_err();

        assert_eq!(err, PricingError::NoPricingData("aws_instance.web".to_string()));
        assert_eq!(resource.monthly_price, 0.0);
        assert_eq!(resource.pricing_status, PricingStatus::Failed);
        assert_eq!(
            resource.pricing_details.unwrap().pricing_source,
            "Error: No pricing data found"
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut client = ready_client();
        client.expect_query().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CatalogError::Transport("connection refused".to_string()))
        });

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.micro");
        let err = adapter.get_price(&mut resource).await.unwrap_err();

        assert!(matches!(err, PricingError::Transport { attempts: 3, .. }));
        // exhausted tier 1, no tier 2
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(
            resource
                .pricing_details
                .unwrap()
                .pricing_source
                .contains("connection refused")
        );
    }

    #[tokio::test]
    async fn test_unsupported_type_makes_no_network_call() {
        let mut client = MockCatalogClient::new();
        client.expect_initialize().never();
        client.expect_query().never();

        let adapter = adapter(client);
        let mut resource = Resource::new("aws_s3_bucket", "assets");
        let err = adapter.get_price(&mut resource).await.unwrap_err();

        assert_eq!(err, PricingError::UnsupportedResourceType("aws_s3_bucket".to_string()));
        assert_eq!(adapter.state(), AdapterState::Uninitialized);
        assert_eq!(
            resource.pricing_details.unwrap().pricing_source,
            "Error: Unsupported resource type"
        );
    }

    #[tokio::test]
    async fn test_failed_initialization_is_cached() {
        let mut client = MockCatalogClient::new();
        client
            .expect_initialize()
            .times(1)
            .returning(|| Err(CatalogError::Auth("invalid credentials".to_string())));
        client.expect_query().never();

        let adapter = adapter(client);
        for name in ["a", "b", "c"] {
            let mut resource = Resource::new("aws_instance", name);
            let err = adapter.get_price(&mut resource).await.unwrap_err();
            assert!(matches!(err, PricingError::Unavailable { .. }));
            assert_eq!(resource.pricing_status, PricingStatus::Failed);
        }
        assert_eq!(adapter.state(), AdapterState::Failed);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        let mut client = MockCatalogClient::new();
        client.expect_initialize().times(1).returning(|| Ok(()));
        client.expect_prepare().returning(|_| Ok(()));
        client.expect_query().returning(|_| Ok(vec![entry("t2.micro", "0.0116")]));

        let adapter = Arc::new(adapter(client));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let adapter = adapter.clone();
                tokio::spawn(async move {
                    let mut resource = ec2_instance("t2.micro");
                    resource.name = format!("web-{i}");
                    adapter.get_price(&mut resource).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(adapter.state(), AdapterState::Ready);
    }

    #[tokio::test]
    async fn test_anomaly_correction_uses_sibling() {
        let mut client = ready_client();
        client
            .expect_query()
            .withf(|q| q.filter_value(fields::INSTANCE_TYPE) == Some("t2.nano"))
            .times(1)
            .returning(|_| Ok(vec![entry("t2.nano", "0.0000000000")]));
        client
            .expect_query()
            .withf(|q| q.filter_value(fields::INSTANCE_TYPE) == Some("t2.micro"))
            .times(1)
            .returning(|_| Ok(vec![entry("t2.micro", "0.0116")]));

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.nano");
        adapter.get_price(&mut resource).await.unwrap();

        assert_eq!(resource.pricing_status, PricingStatus::Estimated);
        assert!((resource.hourly_price - 0.0058).abs() < 1e-9);
        assert_eq!(
            resource.pricing_details.unwrap().pricing_source,
            "Estimated: 50% of t2.micro price"
        );
    }

    #[tokio::test]
    async fn test_anomaly_sibling_failure_keeps_zero() {
        let mut client = ready_client();
        client
            .expect_query()
            .withf(|q| q.filter_value(fields::INSTANCE_TYPE) == Some("t2.nano"))
            .returning(|_| Ok(vec![entry("t2.nano", "0.0")]));
        client
            .expect_query()
            .withf(|q| q.filter_value(fields::INSTANCE_TYPE) == Some("t2.micro"))
            .returning(|_| Err(CatalogError::Timeout(Duration::from_secs(1))));

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.nano");
        adapter.get_price(&mut resource).await.unwrap();

        assert_eq!(resource.pricing_status, PricingStatus::Priced);
        assert_eq!(resource.hourly_price, 0.0);
    }

    #[tokio::test]
    async fn test_uncalibrated_zero_price_is_kept() {
        let mut client = ready_client();
        client
            .expect_query()
            .with(always())
            .times(1)
            .returning(|_| Ok(vec![entry("m5.large", "0.0")]));

        let adapter = adapter(client);
        let mut resource = ec2_instance("m5.large");
        adapter.get_price(&mut resource).await.unwrap();

        assert_eq!(resource.hourly_price, 0.0);
        assert_eq!(resource.pricing_status, PricingStatus::Priced);
    }

    #[tokio::test]
    async fn test_no_tier2_when_only_service_and_one_dimension() {
        let mut client = ready_client();
        client
            .expect_query()
            .withf(|q| q.filters.len() == 2 && q.filter_value(fields::CACHE_ENGINE) == Some("Redis"))
            .times(1)
            .returning(|_| Ok(vec![]));

        let profile = PricingProfile::new("aws", "AWS").with_rule(
            "aws_elasticache",
            ServiceKind::Cache,
            "AmazonElastiCache",
        );
        let adapter = CatalogPricingAdapter::new(client, profile).with_retry_policy(fast_retry());
        let mut resource = Resource::new("aws_elasticache_cluster", "cache");
        let err = adapter.get_price(&mut resource).await.unwrap_err();

        assert_eq!(
            err,
            PricingError::NoPricingData("aws_elasticache_cluster.cache".to_string())
        );
        assert_eq!(resource.pricing_status, PricingStatus::Failed);
    }

    #[tokio::test]
    async fn test_tier2_transport_failure_is_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut client = ready_client();
        client
            .expect_query()
            .withf(|q| q.filters.len() > 2)
            .times(1)
            .returning(|_| Ok(vec![]));
        client
            .expect_query()
            .withf(|q| q.filters.len() == 2)
            .returning(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CatalogError::Transport("connection reset".to_string()))
            });

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.micro");
        let err = adapter.get_price(&mut resource).await.unwrap_err();

        assert!(matches!(err, PricingError::Transport { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(resource.pricing_status, PricingStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_warm_up_still_queries() {
        let mut client = MockCatalogClient::new();
        client.expect_initialize().returning(|| Ok(()));
        client
            .expect_prepare()
            .returning(|_| Err(CatalogError::Timeout(Duration::from_secs(1))));
        client
            .expect_query()
            .times(1)
            .returning(|_| Ok(vec![entry("t2.micro", "0.0116")]));

        let adapter = adapter(client);
        let mut resource = ec2_instance("t2.micro");
        adapter.get_price(&mut resource).await.unwrap();
        assert_eq!(resource.pricing_status, PricingStatus::Priced);
    }
}
