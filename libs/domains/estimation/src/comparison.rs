//! Comparison of two estimation reports

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::aggregation::Report;
use crate::models::Resource;

/// One changed property of a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub property: String,
    pub old_value: String,
    pub new_value: String,
    /// Monthly cost impact; only set on the price change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_on_cost: Option<f64>,
}

/// A resource present in both reports whose cost-relevant properties differ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub resource_id: String,
    pub old_resource: Resource,
    pub new_resource: Resource,
    /// Monthly cost difference (quantity-weighted)
    pub price_diff: f64,
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDiff {
    pub previous_report_id: Uuid,
    pub current_report_id: Uuid,
    pub previous_total_monthly: f64,
    pub current_total_monthly: f64,
    pub added_resources: Vec<Resource>,
    pub removed_resources: Vec<Resource>,
    pub changed_resources: Vec<ResourceDiff>,
    /// Current minus previous monthly total
    pub price_diff: f64,
    /// `price_diff` relative to the previous total; 0 when the previous total is 0
    pub price_diff_percent: f64,
}

impl ReportDiff {
    pub fn is_empty(&self) -> bool {
        self.added_resources.is_empty()
            && self.removed_resources.is_empty()
            && self.changed_resources.is_empty()
    }
}

/// Diff `current` against `previous`, matching resources by id.
///
/// Output lists follow resource id order.
pub fn compare_reports(previous: &Report, current: &Report) -> ReportDiff {
    let old: BTreeMap<&str, &Resource> =
        previous.resources.iter().map(|r| (r.id.as_str(), r)).collect();
    let new: BTreeMap<&str, &Resource> =
        current.resources.iter().map(|r| (r.id.as_str(), r)).collect();

    let added_resources = new
        .iter()
        .filter(|(id, _)| !old.contains_key(*id))
        .map(|(_, r)| (*r).clone())
        .collect();

    let removed_resources = old
        .iter()
        .filter(|(id, _)| !new.contains_key(*id))
        .map(|(_, r)| (*r).clone())
        .collect();

    let changed_resources = old
        .iter()
        .filter_map(|(id, before)| new.get(id).and_then(|after| diff_resource(before, after)))
        .collect();

    let price_diff = current.total_monthly - previous.total_monthly;
    let price_diff_percent = if previous.total_monthly != 0.0 {
        price_diff / previous.total_monthly * 100.0
    } else {
        0.0
    };

    ReportDiff {
        previous_report_id: previous.report_id,
        current_report_id: current.report_id,
        previous_total_monthly: previous.total_monthly,
        current_total_monthly: current.total_monthly,
        added_resources,
        removed_resources,
        changed_resources,
        price_diff,
        price_diff_percent,
    }
}

fn diff_resource(before: &Resource, after: &Resource) -> Option<ResourceDiff> {
    let mut changes = Vec::new();

    let mut push = |property: &str, old_value: String, new_value: String, impact: Option<f64>| {
        if old_value != new_value {
            changes.push(Change {
                property: property.to_string(),
                old_value,
                new_value,
                impact_on_cost: impact,
            });
        }
    };

    push("size", display(before.size.as_deref()), display(after.size.as_deref()), None);
    push(
        "region",
        display(before.region.as_deref()),
        display(after.region.as_deref()),
        None,
    );
    push(
        "quantity",
        before.quantity.to_string(),
        after.quantity.to_string(),
        None,
    );

    let price_diff = after.monthly_cost() - before.monthly_cost();
    push(
        "monthly_price",
        format!("{:.2}", before.monthly_price),
        format!("{:.2}", after.monthly_price),
        Some(price_diff),
    );

    if changes.is_empty() {
        return None;
    }

    Some(ResourceDiff {
        resource_id: before.id.clone(),
        old_resource: before.clone(),
        new_resource: after.clone(),
        price_diff,
        changes,
    })
}

fn display(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str, size: &str, hourly: f64, quantity: i64) -> Resource {
        let mut resource = Resource::new("aws_instance", name);
        resource.size = Some(size.to_string());
        resource.region = Some("us-east-1".to_string());
        resource.set_quantity(quantity);
        resource.apply_hourly_price(hourly);
        resource
    }

    fn report(resources: Vec<Resource>) -> Report {
        let mut report = Report::new();
        for r in resources {
            report.add_resource(r);
        }
        report
    }

    #[test]
    fn test_identical_reports() {
        let previous = report(vec![resource("web", "t2.micro", 0.0116, 1)]);
        let current = report(vec![resource("web", "t2.micro", 0.0116, 1)]);

        let diff = compare_reports(&previous, &current);
        assert!(diff.is_empty());
        assert_eq!(diff.price_diff, 0.0);
        assert_eq!(diff.price_diff_percent, 0.0);
    }

    #[test]
    fn test_added_removed_and_changed() {
        let previous = report(vec![
            resource("web", "t2.micro", 0.0116, 1),
            resource("old", "t2.micro", 0.0116, 1),
        ]);
        let current = report(vec![
            resource("web", "t2.small", 0.023, 2),
            resource("new", "m5.large", 0.096, 1),
        ]);

        let diff = compare_reports(&previous, &current);
        assert_eq!(diff.added_resources[0].id, "aws_instance.new");
        assert_eq!(diff.removed_resources[0].id, "aws_instance.old");

        let changed = &diff.changed_resources[0];
        assert_eq!(changed.resource_id, "aws_instance.web");
        let properties: Vec<&str> = changed.changes.iter().map(|c| c.property.as_str()).collect();
        assert_eq!(properties, vec!["size", "quantity", "monthly_price"]);

        let expected = 0.023 * 730.0 * 2.0 - 0.0116 * 730.0;
        assert!((changed.price_diff - expected).abs() < 1e-9);
        assert!((changed.changes[2].impact_on_cost.unwrap() - expected).abs() < 1e-9);
        assert!(diff.price_diff > 0.0);
    }

    #[test]
    fn test_percent_relative_to_previous() {
        let previous = report(vec![resource("web", "t2.micro", 1.0, 1)]);
        let current = report(vec![resource("web", "t2.micro", 1.5, 1)]);

        let diff = compare_reports(&previous, &current);
        assert!((diff.price_diff_percent - 50.0).abs() < 1e-9);
    }
}
