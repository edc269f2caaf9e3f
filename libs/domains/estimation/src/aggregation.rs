//! Cost aggregation engine
//!
//! A [`Report`] holds priced resources plus running totals and breakdowns
//! keyed by provider, resource type, region and tag. All amounts are
//! `price × quantity`; breakdowns use the monthly figure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{DEFAULT_CURRENCY, Resource};

/// Version of the report layout
pub const REPORT_VERSION: &str = "1.0";

/// Breakdown key for resources without a region
pub const UNSPECIFIED_REGION: &str = "unspecified";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub currency: String,
    /// Name of the parser that produced the declarations
    #[serde(default)]
    pub iac_format: String,
    pub report_version: String,

    pub resources: Vec<Resource>,
    pub total_hourly: f64,
    pub total_monthly: f64,
    pub total_yearly: f64,

    #[serde(default)]
    pub by_provider: BTreeMap<String, f64>,
    #[serde(default)]
    pub by_resource_type: BTreeMap<String, f64>,
    #[serde(default)]
    pub by_region: BTreeMap<String, f64>,
    /// tag key → tag value → monthly cost
    #[serde(default)]
    pub by_tag: BTreeMap<String, BTreeMap<String, f64>>,

    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Self {
            report_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            currency: DEFAULT_CURRENCY.to_string(),
            iac_format: String::new(),
            report_version: REPORT_VERSION.to_string(),
            resources: Vec::new(),
            total_hourly: 0.0,
            total_monthly: 0.0,
            total_yearly: 0.0,
            by_provider: BTreeMap::new(),
            by_resource_type: BTreeMap::new(),
            by_region: BTreeMap::new(),
            by_tag: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_iac_format(mut self, format: impl Into<String>) -> Self {
        self.iac_format = format.into();
        self
    }

    /// Append a resource and fold its cost into totals and breakdowns
    pub fn add_resource(&mut self, resource: Resource) {
        self.accumulate(&resource);
        self.resources.push(resource);
    }

    /// Recompute totals and breakdowns from the resource list.
    ///
    /// Idempotent, and equal to calling [`Report::add_resource`] for each
    /// resource in turn.
    pub fn summarize(&mut self) {
        self.total_hourly = 0.0;
        self.total_monthly = 0.0;
        self.total_yearly = 0.0;
        self.by_provider.clear();
        self.by_resource_type.clear();
        self.by_region.clear();
        self.by_tag.clear();

        let resources = std::mem::take(&mut self.resources);
        for resource in &resources {
            self.accumulate(resource);
        }
        self.resources = resources;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    fn accumulate(&mut self, resource: &Resource) {
        let monthly = resource.monthly_cost();

        self.total_hourly += resource.hourly_cost();
        self.total_monthly += monthly;
        self.total_yearly += resource.yearly_cost();

        *self.by_provider.entry(resource.provider.clone()).or_insert(0.0) += monthly;
        *self
            .by_resource_type
            .entry(resource.resource_type.clone())
            .or_insert(0.0) += monthly;
        *self.by_region.entry(region_key(resource)).or_insert(0.0) += monthly;

        for (key, value) in &resource.tags {
            *self
                .by_tag
                .entry(key.clone())
                .or_default()
                .entry(value.clone())
                .or_insert(0.0) += monthly;
        }
    }
}

fn region_key(resource: &Resource) -> String {
    match resource.region.as_deref() {
        Some(region) if !region.is_empty() => region.to_string(),
        _ => UNSPECIFIED_REGION.to_string(),
    }
}
