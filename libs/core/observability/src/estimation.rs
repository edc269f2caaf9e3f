//! Estimation-specific metrics.

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Estimation metrics recorder
pub struct EstimationMetrics;

impl EstimationMetrics {
    // =========================================================================
    // Catalog
    // =========================================================================

    /// Record one catalog query attempt
    pub fn record_catalog_query(provider: &str, service: &str, outcome: &str) {
        counter!(
            "catalog_queries_total",
            "provider" => provider.to_string(),
            "service" => service.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Record the final pricing outcome of one resource
    pub fn record_resolution(provider: &str, outcome: &str) {
        counter!(
            "price_resolutions_total",
            "provider" => provider.to_string(),
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }

    // =========================================================================
    // Runs
    // =========================================================================

    /// Record a completed estimation run
    pub fn record_run_completed(resources: usize, errors: usize, duration_secs: f64) {
        counter!("estimation_runs_total", "status" => "completed").increment(1);
        histogram!("estimation_duration_seconds").record(duration_secs);
        gauge!("estimated_resources_total").set(resources as f64);

        tracing::info!(
            resources = resources,
            errors = errors,
            duration_secs = duration_secs,
            "Estimation run completed"
        );
    }

    /// Record a failed or cancelled estimation run
    pub fn record_run_failed(reason: &str) {
        counter!("estimation_runs_total", "status" => "failed").increment(1);
        tracing::error!(reason = reason, "Estimation run failed");
    }

    /// Set the monthly cost gauge for a provider
    pub fn set_monthly_cost(provider: &str, monthly: f64) {
        gauge!("estimated_monthly_cost_usd", "provider" => provider.to_string()).set(monthly);
    }
}

/// Timer guard for catalog query durations.
///
/// Records the duration when `stop()` is called or when dropped.
pub struct CatalogTimer {
    start: Instant,
    provider: String,
    service: String,
    stopped: bool,
}

impl CatalogTimer {
    pub fn new(provider: &str, service: &str) -> Self {
        Self {
            start: Instant::now(),
            provider: provider.to_string(),
            service: service.to_string(),
            stopped: false,
        }
    }

    /// Stop the timer and record the duration. Returns duration in milliseconds.
    pub fn stop(&mut self) -> u64 {
        if self.stopped {
            return 0;
        }
        self.stopped = true;

        let duration = self.start.elapsed();

        histogram!(
            "catalog_query_duration_seconds",
            "provider" => self.provider.clone(),
            "service" => self.service.clone()
        )
        .record(duration.as_secs_f64());

        duration.as_millis() as u64
    }
}

impl Drop for CatalogTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}
