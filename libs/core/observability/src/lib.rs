//! Observability utilities for the cost estimator.
//!
//! This crate provides:
//! - A process-wide Prometheus recorder
//! - Metric helpers for catalog queries, price resolution and estimation runs
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, render_metrics, EstimationMetrics};
//!
//! init_metrics()?;
//! EstimationMetrics::record_resolution("aws", "priced");
//! println!("{}", render_metrics());
//! ```

pub mod estimation;

pub use estimation::{CatalogTimer, EstimationMetrics};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// Only the first call installs the recorder; later calls return the same handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;

        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();

        Ok(handle)
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render the Prometheus text exposition of everything recorded so far
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    describe_counter!(
        "catalog_queries_total",
        "Pricing catalog query attempts by provider and outcome"
    );
    describe_histogram!(
        "catalog_query_duration_seconds",
        "Pricing catalog query duration in seconds"
    );
    describe_counter!(
        "price_resolutions_total",
        "Resource price resolutions by provider and outcome"
    );
    describe_counter!(
        "estimation_runs_total",
        "Estimation runs by status"
    );
    describe_histogram!(
        "estimation_duration_seconds",
        "End-to-end estimation duration in seconds"
    );
    describe_gauge!(
        "estimated_monthly_cost_usd",
        "Monthly cost of the last estimation by provider"
    );
    describe_gauge!(
        "estimated_resources_total",
        "Resources in the last estimation"
    );
}
