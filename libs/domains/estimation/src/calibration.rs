//! Anomaly correction table
//!
//! Some catalog SKUs report a zero on-demand price for the smallest size of a
//! family. A rule maps such a size to a larger sibling in the same family and
//! a scaling factor; the resolver prices the sibling and scales it down.

use serde::{Deserialize, Serialize};

/// Placeholder ratio between a bad size and its reference sibling
pub const DEFAULT_SIBLING_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRule {
    /// Catalog service code, e.g. "AmazonEC2"
    pub service: String,
    /// SKU family, e.g. "t2"
    pub family: String,
    /// Size known to report a spurious zero price, e.g. "nano"
    pub size: String,
    /// Sibling size to price instead, e.g. "micro"
    pub reference_size: String,
    /// Multiplier applied to the sibling's price
    pub factor: f64,
}

impl CalibrationRule {
    pub fn new(
        service: impl Into<String>,
        family: impl Into<String>,
        size: impl Into<String>,
        reference_size: impl Into<String>,
        factor: f64,
    ) -> Self {
        Self {
            service: service.into(),
            family: family.into(),
            size: size.into(),
            reference_size: reference_size.into(),
            factor,
        }
    }

    /// Full SKU name of the reference sibling
    pub fn reference_sku(&self) -> String {
        format!("{}.{}", self.family, self.reference_size)
    }
}

/// Data-driven set of calibration rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    rules: Vec<CalibrationRule>,
}

impl CalibrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Burstable EC2 `nano` sizes, priced at half of `micro`
    pub fn aws_defaults() -> Self {
        ["t2", "t3", "t3a", "t4g"]
            .into_iter()
            .fold(Self::new(), |table, family| {
                table.with_rule(CalibrationRule::new(
                    "AmazonEC2",
                    family,
                    "nano",
                    "micro",
                    DEFAULT_SIBLING_FACTOR,
                ))
            })
    }

    pub fn with_rule(mut self, rule: CalibrationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rule for a `family.size` SKU within a service, if any
    pub fn lookup(&self, service: &str, sku: &str) -> Option<&CalibrationRule> {
        let (family, size) = sku.rsplit_once('.')?;
        self.rules.iter().find(|rule| {
            rule.service == service
                && rule.family.eq_ignore_ascii_case(family)
                && rule.size.eq_ignore_ascii_case(size)
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aws_defaults_cover_burstable_nano() {
        let table = CalibrationTable::aws_defaults();
        assert_eq!(table.len(), 4);

        let rule = table.lookup("AmazonEC2", "t2.nano").unwrap();
        assert_eq!(rule.reference_sku(), "t2.micro");
        assert_eq!(rule.factor, 0.5);

        assert!(table.lookup("AmazonEC2", "t4g.nano").is_some());
    }

    #[test]
    fn test_lookup_misses() {
        let table = CalibrationTable::aws_defaults();
        assert!(table.lookup("AmazonEC2", "t2.micro").is_none());
        assert!(table.lookup("AmazonRDS", "t2.nano").is_none());
        assert!(table.lookup("AmazonEC2", "nano").is_none());
        assert!(CalibrationTable::new().lookup("AmazonEC2", "t2.nano").is_none());
    }

    #[test]
    fn test_custom_rule_on_multi_dot_sku() {
        let table = CalibrationTable::new().with_rule(CalibrationRule::new(
            "AmazonRDS",
            "db.t3",
            "micro",
            "small",
            0.5,
        ));

        let rule = table.lookup("AmazonRDS", "db.t3.micro").unwrap();
        assert_eq!(rule.reference_sku(), "db.t3.small");
    }
}
