//! Plain-text rendering of reports and report diffs

use domain_estimation::{Report, ReportDiff, Resource};
use std::collections::BTreeMap;
use std::fmt::Write;

fn money(amount: f64, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}

fn resource_line(out: &mut String, resource: &Resource, currency: &str) {
    let size = resource.size.as_deref().unwrap_or("-");
    let region = resource.region.as_deref().unwrap_or("-");
    let _ = writeln!(
        out,
        "  {:<48} {:<16} {:<14} x{:<3} {:>14}/mo  [{}]",
        resource.id,
        size,
        region,
        resource.quantity,
        money(resource.monthly_cost(), currency),
        resource.pricing_status
    );
}

fn breakdown(out: &mut String, title: &str, values: &BTreeMap<String, f64>, currency: &str) {
    if values.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for (key, amount) in values {
        let _ = writeln!(out, "  {:<32} {:>14}", key, money(*amount, currency));
    }
}

pub fn render_report(report: &Report) -> String {
    let currency = report.currency.as_str();
    let mut out = String::new();

    let _ = writeln!(out, "Cost estimate {} ({})", report.report_id, report.iac_format);
    let _ = writeln!(out, "Generated {}", report.timestamp.to_rfc3339());
    let _ = writeln!(out);
    let _ = writeln!(out, "Hourly:  {}", money(report.total_hourly, currency));
    let _ = writeln!(out, "Monthly: {}", money(report.total_monthly, currency));
    let _ = writeln!(out, "Yearly:  {}", money(report.total_yearly, currency));

    if !report.resources.is_empty() {
        let _ = writeln!(out, "\nResources:");
        for resource in &report.resources {
            resource_line(&mut out, resource, currency);
        }
    }

    breakdown(&mut out, "By provider", &report.by_provider, currency);
    breakdown(&mut out, "By resource type", &report.by_resource_type, currency);
    breakdown(&mut out, "By region", &report.by_region, currency);
    for (key, values) in &report.by_tag {
        breakdown(&mut out, &format!("By tag '{key}'"), values, currency);
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }
    if !report.errors.is_empty() {
        let _ = writeln!(out, "\nErrors:");
        for error in &report.errors {
            let _ = writeln!(out, "  - {error}");
        }
    }

    out
}

pub fn render_diff(diff: &ReportDiff, currency: &str) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Monthly: {} -> {} ({:+.2} {}, {:+.1}%)",
        money(diff.previous_total_monthly, currency),
        money(diff.current_total_monthly, currency),
        diff.price_diff,
        currency,
        diff.price_diff_percent
    );

    if diff.is_empty() {
        let _ = writeln!(out, "\nNo resource changes");
        return out;
    }

    if !diff.added_resources.is_empty() {
        let _ = writeln!(out, "\nAdded:");
        for resource in &diff.added_resources {
            resource_line(&mut out, resource, currency);
        }
    }
    if !diff.removed_resources.is_empty() {
        let _ = writeln!(out, "\nRemoved:");
        for resource in &diff.removed_resources {
            resource_line(&mut out, resource, currency);
        }
    }
    if !diff.changed_resources.is_empty() {
        let _ = writeln!(out, "\nChanged:");
        for changed in &diff.changed_resources {
            let _ = writeln!(out, "  {} ({:+.2} {}/mo)", changed.resource_id, changed.price_diff, currency);
            for change in &changed.changes {
                let _ = writeln!(
                    out,
                    "    {}: {} -> {}",
                    change.property, change.old_value, change.new_value
                );
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_estimation::{PricingStatus, compare_reports};

    fn priced(resource_type: &str, name: &str, hourly: f64) -> Resource {
        let mut resource = Resource::new(resource_type, name);
        resource.size = Some("t3.micro".to_string());
        resource.region = Some("us-east-1".to_string());
        resource.apply_hourly_price(hourly);
        resource.pricing_status = PricingStatus::Priced;
        resource
    }

    #[test]
    fn test_render_report() {
        let mut report = Report::new().with_iac_format("terraform-plan");
        report.add_resource(priced("aws_instance", "web", 0.01));
        report.add_warning("Could not infer region for aws_instance.web");
        report.add_error("Failed to price aws_db_instance.db: boom");

        let text = render_report(&report);
        assert!(text.contains("Monthly: 7.30 USD"));
        assert!(text.contains("aws_instance.web"));
        assert!(text.contains("[priced]"));
        assert!(text.contains("By provider:"));
        assert!(text.contains("Warnings:"));
        assert!(text.contains("Errors:\n  - Failed to price aws_db_instance.db: boom"));
    }

    #[test]
    fn test_render_diff() {
        let mut previous = Report::new();
        previous.add_resource(priced("aws_instance", "web", 0.01));
        previous.add_resource(priced("aws_instance", "old", 0.01));

        let mut current = Report::new();
        current.add_resource(priced("aws_instance", "web", 0.02));
        current.add_resource(priced("aws_instance", "new", 0.01));

        let text = render_diff(&compare_reports(&previous, &current), "USD");
        assert!(text.contains("Added:"));
        assert!(text.contains("aws_instance.new"));
        assert!(text.contains("Removed:"));
        assert!(text.contains("aws_instance.old"));
        assert!(text.contains("Changed:\n  aws_instance.web (+7.30 USD/mo)"));
    }

    #[test]
    fn test_render_unchanged_diff() {
        let mut report = Report::new();
        report.add_resource(priced("aws_instance", "web", 0.01));

        let text = render_diff(&compare_reports(&report, &report), "USD");
        assert!(text.contains("No resource changes"));
    }
}
