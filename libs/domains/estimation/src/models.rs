use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use crate::error::PricingError;

/// Average hours per month (365 days / 12 months * 24 hours)
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Hours per (non-leap) year
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Currency used when a catalog does not say otherwise
pub const DEFAULT_CURRENCY: &str = "USD";

/// A literal attribute value from a resource declaration.
///
/// Declarations are schema-less, so values are kept in this loose shape and
/// interpreted by the inference heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
    Null,
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            AttributeValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for AttributeValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        AttributeValue::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(AttributeValue::Number)
                .unwrap_or(AttributeValue::Null),
            serde_json::Value::String(s) => AttributeValue::String(s),
            serde_json::Value::Array(items) => {
                AttributeValue::List(items.into_iter().map(AttributeValue::from).collect())
            }
            serde_json::Value::Object(map) => AttributeValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Attribute map of one declaration.
///
/// Ordered by name so every heuristic walks attributes in the same canonical order.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// One resource declaration as handed over by a parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Declaration type, e.g. "aws_instance"
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Declaration name, unique per type
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Declaration {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// How far pricing got for a resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, Hash,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PricingStatus {
    /// Not yet sent through price resolution
    #[default]
    Pending,
    /// Priced from the exact (tier 1) query
    Priced,
    /// Priced from the relaxed (tier 2) query
    Relaxed,
    /// Price synthesized from a calibrated sibling SKU
    Estimated,
    /// Resolution failed; prices are zero
    Failed,
    /// No pricing adapter registered for the provider; prices are zero
    NoAdapter,
}

/// One component of a resource's price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComponent {
    /// e.g. "On-Demand Hrs"
    pub name: String,
    pub unit_price: f64,
    pub units: f64,
    pub total: f64,
}

/// Diagnostic record attached to a priced (or failed) resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingDetails {
    pub currency: String,
    /// Catalog name, "Error: …", or an estimation label
    pub pricing_source: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub price_components: Vec<PriceComponent>,
    /// Product attributes reported by the catalog for the matched SKU
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl PricingDetails {
    pub fn new(currency: impl Into<String>, pricing_source: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            pricing_source: pricing_source.into(),
            last_updated: Utc::now(),
            price_components: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.pricing_source.starts_with("Error:")
    }
}

/// A cost-bearing unit from an IaC declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// "{resource_type}.{name}", unique within a report
    pub id: String,
    pub name: String,
    pub resource_type: String,
    /// Prefix of the resource type before the first '_', e.g. "aws"
    pub provider: String,
    pub region: Option<String>,
    /// SKU / instance class used for the catalog lookup, e.g. "t3.micro"
    pub size: Option<String>,
    /// Number of instances, always >= 1
    pub quantity: u32,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Declared attributes, kept for class-specific catalog dimensions
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: Attributes,
    pub hourly_price: f64,
    pub monthly_price: f64,
    pub yearly_price: f64,
    #[serde(default)]
    pub pricing_status: PricingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_details: Option<PricingDetails>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let name = name.into();

        Self {
            id: format!("{}.{}", resource_type, name),
            provider: provider_of(&resource_type).to_string(),
            name,
            resource_type,
            region: None,
            size: None,
            quantity: 1,
            tags: BTreeMap::new(),
            properties: Attributes::new(),
            hourly_price: 0.0,
            monthly_price: 0.0,
            yearly_price: 0.0,
            pricing_status: PricingStatus::Pending,
            pricing_details: None,
        }
    }

    /// Set the quantity, clamping non-positive values to 1
    pub fn set_quantity(&mut self, quantity: i64) {
        self.quantity = clamp_quantity(quantity);
    }

    /// Set all three price fields from one hourly price
    pub fn apply_hourly_price(&mut self, hourly: f64) {
        self.hourly_price = hourly;
        self.monthly_price = hourly * HOURS_PER_MONTH;
        self.yearly_price = hourly * HOURS_PER_YEAR;
    }

    /// Zero all price fields and record why
    pub fn mark_failed(&mut self, error: &PricingError, currency: &str) {
        self.apply_hourly_price(0.0);
        self.pricing_status = PricingStatus::Failed;
        self.pricing_details = Some(PricingDetails::new(
            currency,
            format!("Error: {}", error.diagnostic()),
        ));
    }

    /// Zero all price fields because no adapter serves this provider
    pub fn mark_no_adapter(&mut self) {
        self.apply_hourly_price(0.0);
        self.pricing_status = PricingStatus::NoAdapter;
    }

    /// Monthly cost weighted by quantity
    pub fn monthly_cost(&self) -> f64 {
        self.monthly_price * self.quantity as f64
    }

    pub fn hourly_cost(&self) -> f64 {
        self.hourly_price * self.quantity as f64
    }

    pub fn yearly_cost(&self) -> f64 {
        self.yearly_price * self.quantity as f64
    }
}

/// Provider prefix of a resource type ("aws_instance" -> "aws")
pub fn provider_of(resource_type: &str) -> &str {
    resource_type
        .split_once('_')
        .map(|(prefix, _)| prefix)
        .unwrap_or(resource_type)
}

/// Clamp a declared quantity into the valid range (>= 1)
pub fn clamp_quantity(quantity: i64) -> u32 {
    quantity.clamp(1, u32::MAX as i64) as u32
}
