//! Pricing catalog contract
//!
//! The resolution engine talks to a remote catalog through [`CatalogClient`].
//! A query carries a service code, an ordered list of term-match filters and
//! a result limit; the catalog answers with opaque JSON documents shaped like
//! the AWS Price List `GetProducts` entries:
//!
//! ```json
//! {
//!   "product": { "sku": "…", "attributes": { "instanceType": "t2.micro", … } },
//!   "terms": {
//!     "OnDemand": {
//!       "SKU.TERM": {
//!         "priceDimensions": {
//!           "SKU.TERM.RATE": { "unit": "Hrs", "pricePerUnit": { "USD": "0.0116" } }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::CatalogResult;

/// Only the first entries of a result set are inspected for a price
pub const MAX_SCANNED_ENTRIES: usize = 5;

/// Default result limit for catalog queries
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Catalog filter field names
pub mod fields {
    pub const SERVICE_CODE: &str = "ServiceCode";
    pub const REGION: &str = "regionCode";
    pub const INSTANCE_TYPE: &str = "instanceType";
    pub const OPERATING_SYSTEM: &str = "operatingSystem";
    pub const TENANCY: &str = "tenancy";
    pub const PRE_INSTALLED_SW: &str = "preInstalledSw";
    pub const CAPACITY_STATUS: &str = "capacitystatus";
    pub const DATABASE_ENGINE: &str = "databaseEngine";
    pub const DEPLOYMENT_OPTION: &str = "deploymentOption";
    pub const CACHE_ENGINE: &str = "cacheEngine";
}

/// One opaque catalog entry
pub type CatalogEntry = Value;

/// Match type of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    #[serde(rename = "TERM_MATCH")]
    TermMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub value: String,
}

impl Filter {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            filter_type: FilterType::TermMatch,
            value: value.into(),
        }
    }

    /// Whether a product attribute value satisfies this filter
    pub fn matches(&self, value: &str) -> bool {
        match self.filter_type {
            FilterType::TermMatch => self.value.eq_ignore_ascii_case(value),
        }
    }
}

/// A request against the pricing catalog.
///
/// The filter list decides the tier: tier 1 carries every known dimension,
/// tier 2 only the service and the size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub service_code: String,
    pub filters: Vec<Filter>,
    pub max_results: usize,
}

impl PriceQuery {
    /// New query already filtered on its service code
    pub fn new(service_code: impl Into<String>) -> Self {
        let service_code = service_code.into();
        Self {
            filters: vec![Filter::term(fields::SERVICE_CODE, service_code.clone())],
            service_code,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::term(field, value));
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Value of the first filter on `field`
    pub fn filter_value(&self, field: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.value.as_str())
    }

    /// Filters other than the service code (applied to product attributes)
    pub fn attribute_filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().filter(|f| f.field != fields::SERVICE_CODE)
    }
}

/// Query interface of a provider's pricing catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Catalog name used in diagnostics (e.g. "AWS")
    fn name(&self) -> &'static str;

    /// Authenticate / handshake. A failure here is terminal for the adapter.
    async fn initialize(&self) -> CatalogResult<()>;

    /// Fetch whatever `query` needs ahead of time, such as a bulk price file.
    ///
    /// Runs outside the per-attempt query deadline under the client's own
    /// limits. Failures are not fatal: `query` reports its own errors.
    async fn prepare(&self, _query: &PriceQuery) -> CatalogResult<()> {
        Ok(())
    }

    /// Run one query attempt
    async fn query(&self, query: &PriceQuery) -> CatalogResult<Vec<CatalogEntry>>;
}

/// On-demand price pulled out of one catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPrice {
    pub amount: f64,
    pub currency: String,
    /// Unit of measure, e.g. "Hrs"
    pub unit: Option<String>,
    /// String-valued product attributes of the entry
    pub attributes: BTreeMap<String, String>,
}

impl ExtractedPrice {
    pub fn is_positive(&self) -> bool {
        self.amount > 0.0
    }
}

/// Navigate entry → terms → OnDemand → priceDimensions → pricePerUnit → currency.
///
/// Entries may also arrive as JSON-encoded strings (the raw `PriceList`
/// format); those are decoded first. Returns `None` when any level is missing
/// or the amount does not parse as a non-negative decimal.
pub fn extract_on_demand_price(entry: &CatalogEntry, currency: &str) -> Option<ExtractedPrice> {
    if let Value::String(raw) = entry {
        let decoded: Value = serde_json::from_str(raw).ok()?;
        return extract_on_demand_price(&decoded, currency);
    }

    let on_demand = entry.get("terms")?.get("OnDemand")?.as_object()?;

    for term in on_demand.values() {
        let Some(dimensions) = term.get("priceDimensions").and_then(Value::as_object) else {
            continue;
        };
        for dimension in dimensions.values() {
            let Some(amount) = dimension
                .get("pricePerUnit")
                .and_then(|p| p.get(currency))
                .and_then(parse_amount)
            else {
                continue;
            };

            return Some(ExtractedPrice {
                amount,
                currency: currency.to_string(),
                unit: dimension
                    .get("unit")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                attributes: product_attributes(entry),
            });
        }
    }

    None
}

/// Scan the first [`MAX_SCANNED_ENTRIES`] entries for a price.
///
/// The first strictly positive price wins; failing that, the first parseable
/// price (typically zero) is returned. `None` means no entry carried a usable
/// price at all.
pub fn scan_entries(entries: &[CatalogEntry], currency: &str) -> Option<ExtractedPrice> {
    let mut first_found: Option<ExtractedPrice> = None;

    for entry in entries.iter().take(MAX_SCANNED_ENTRIES) {
        let Some(price) = extract_on_demand_price(entry, currency) else {
            continue;
        };
        if price.is_positive() {
            return Some(price);
        }
        if first_found.is_none() {
            first_found = Some(price);
        }
    }

    first_found
}

fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

fn product_attributes(entry: &CatalogEntry) -> BTreeMap<String, String> {
    entry
        .get("product")
        .and_then(|p| p.get("attributes"))
        .and_then(Value::as_object)
        .map(|attrs| {
            attrs
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Build an entry in the catalog shape. Used by catalog clients that
/// assemble entries from bulk offer files, and by tests.
pub fn on_demand_entry(
    sku: &str,
    attributes: &BTreeMap<String, String>,
    currency: &str,
    amount: &str,
    unit: &str,
) -> CatalogEntry {
    let term_key = format!("{sku}.JRTCKXETXF");
    let rate_key = format!("{term_key}.6YS6EN2CT7");

    serde_json::json!({
        "product": {
            "sku": sku,
            "attributes": attributes,
        },
        "terms": {
            "OnDemand": {
                term_key: {
                    "sku": sku,
                    "priceDimensions": {
                        rate_key: {
                            "unit": unit,
                            "pricePerUnit": { currency: amount }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(amount: &str) -> CatalogEntry {
        let attributes = BTreeMap::from([("instanceType".to_string(), "t2.micro".to_string())]);
        on_demand_entry("ABC123", &attributes, "USD", amount, "Hrs")
    }

    #[test]
    fn test_query_starts_with_service_filter() {
        let query = PriceQuery::new("AmazonEC2").with_filter(fields::REGION, "us-east-1");
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filter_value(fields::SERVICE_CODE), Some("AmazonEC2"));
        assert_eq!(query.filter_value(fields::REGION), Some("us-east-1"));
        assert_eq!(query.attribute_filters().count(), 1);
        assert_eq!(query.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn test_filter_serializes_like_the_api() {
        let filter = Filter::term(fields::INSTANCE_TYPE, "t2.micro");
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value, json!({ "field": "instanceType", "type": "TERM_MATCH", "value": "t2.micro" }));
        assert!(filter.matches("T2.MICRO"));
    }

    #[test]
    fn test_extract_price() {
        let price = extract_on_demand_price(&entry("0.0116000000"), "USD").unwrap();
        assert!((price.amount - 0.0116).abs() < 1e-12);
        assert_eq!(price.unit.as_deref(), Some("Hrs"));
        assert_eq!(price.attributes["instanceType"], "t2.micro");
    }

    #[test]
    fn test_extract_price_from_encoded_string() {
        let raw = Value::String(entry("0.5").to_string());
        let price = extract_on_demand_price(&raw, "USD").unwrap();
        assert_eq!(price.amount, 0.5);
    }

    #[test]
    fn test_extract_price_missing_levels() {
        assert!(extract_on_demand_price(&json!({}), "USD").is_none());
        assert!(extract_on_demand_price(&json!({ "terms": { "Reserved": {} } }), "USD").is_none());
        assert!(extract_on_demand_price(&entry("0.1"), "EUR").is_none());
        assert!(extract_on_demand_price(&entry("n/a"), "USD").is_none());
    }

    #[test]
    fn test_scan_prefers_positive_price() {
        let entries = vec![json!({}), entry("0.0000000000"), entry("0.0208")];
        let price = scan_entries(&entries, "USD").unwrap();
        assert_eq!(price.amount, 0.0208);
    }

    #[test]
    fn test_scan_falls_back_to_first_parseable() {
        let entries = vec![entry("0.0"), entry("garbage")];
        let price = scan_entries(&entries, "USD").unwrap();
        assert_eq!(price.amount, 0.0);
        assert!(!price.is_positive());
    }

    #[test]
    fn test_scan_only_looks_at_first_five() {
        let mut entries = vec![entry("0.0"); MAX_SCANNED_ENTRIES];
        entries.push(entry("1.0"));
        let price = scan_entries(&entries, "USD").unwrap();
        assert_eq!(price.amount, 0.0);
    }

    #[test]
    fn test_scan_empty() {
        assert!(scan_entries(&[], "USD").is_none());
    }
}
