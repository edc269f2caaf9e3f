//! Cost Estimator
//!
//! Estimates the running cost of Infrastructure-as-Code declarations from
//! public cloud pricing catalogs, and compares estimates between revisions.

use clap::{Parser, Subcommand, ValueEnum};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_estimation::{EstimationError, Estimator, PricingStatus, Report, compare_reports};
use eyre::{Result, WrapErr};
use observability::EstimationMetrics;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

mod config;
mod parsers;
mod providers;
mod render;

use config::Config;

#[derive(Parser)]
#[command(name = "cost-estimator")]
#[command(version)]
#[command(about = "Estimate cloud costs of Infrastructure-as-Code declarations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the cost of Terraform configuration, a Terraform plan, or declaration files
    Estimate {
        /// Plan JSON file, `.tf` file, declarations file, or a directory of `.tf` or declaration files
        #[arg(short, long)]
        path: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output_file: Option<PathBuf>,

        /// Resources priced concurrently. Overrides ESTIMATOR_CONCURRENCY.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Providers to price (e.g. aws). Defaults to every enabled provider.
        #[arg(short = 'P', long, value_delimiter = ',')]
        providers: Option<Vec<String>>,

        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Compare a fresh estimate against a previously saved JSON report
    Diff {
        #[arg(short, long)]
        path: PathBuf,

        /// Previous report (JSON output of `estimate`)
        #[arg(short = 'r', long)]
        previous: PathBuf,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize every pricing adapter and show its state
    Status,
}

#[derive(Serialize)]
struct AdapterStatus {
    provider: String,
    state: String,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    let environment = Environment::from_env();
    init_tracing(&environment);

    observability::init_metrics().map_err(|e| eyre::eyre!("Failed to install metrics recorder: {}", e))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            path,
            format,
            output_file,
            concurrency,
            providers,
            metrics,
        } => {
            let estimator = build_estimator(&config, concurrency, providers.as_deref());
            let report = run_estimate(&estimator, &path).await?;

            let output = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)?,
                OutputFormat::Text => render::render_report(&report),
            };
            write_output(&output, output_file.as_deref())?;

            if metrics {
                println!("{}", observability::render_metrics());
            }
        }

        Commands::Diff {
            path,
            previous,
            format,
        } => {
            let content = std::fs::read_to_string(&previous)
                .wrap_err_with(|| format!("Failed to read previous report {}", previous.display()))?;
            let previous: Report = serde_json::from_str(&content)
                .wrap_err_with(|| format!("Failed to decode previous report {}", previous.display()))?;

            let estimator = build_estimator(&config, None, None);
            let current = run_estimate(&estimator, &path).await?;
            let diff = compare_reports(&previous, &current);

            let output = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&diff)?,
                OutputFormat::Text => render::render_diff(&diff, &current.currency),
            };
            write_output(&output, None)?;
        }

        Commands::Status => {
            let registry = providers::build_registry(&config);
            let mut statuses = Vec::new();

            for provider in registry.providers() {
                let Some(adapter) = registry.get(provider) else {
                    continue;
                };
                let error = adapter.initialize().await.err().map(|e| e.to_string());
                statuses.push(AdapterStatus {
                    provider: provider.to_string(),
                    state: adapter.state().to_string(),
                    error,
                });
            }

            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
    }

    Ok(())
}

fn build_estimator(config: &Config, concurrency: Option<usize>, only: Option<&[String]>) -> Estimator {
    let mut registry = providers::build_registry(config);
    if let Some(only) = only {
        registry = providers::select(&registry, only);
    }

    let mut estimator = Estimator::new(parsers::build_parsers(), registry)
        .with_concurrency(concurrency.unwrap_or(config.estimator.concurrency));
    if let Some(region) = &config.estimator.default_region {
        estimator = estimator.with_default_region(region.clone());
    }
    estimator
}

async fn run_estimate(estimator: &Estimator, path: &Path) -> Result<Report> {
    info!(path = %path.display(), "Starting estimation");
    let started = Instant::now();

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let report = match estimator.estimate_with_shutdown(path, shutdown).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Estimation failed");
            EstimationMetrics::record_run_failed(failure_reason(&e));
            return Err(e.into());
        }
    };

    record_report_metrics(&report, started.elapsed().as_secs_f64());
    info!(
        "Estimation complete: {} resources, {:.2} {}/month, {} errors",
        report.resources.len(),
        report.total_monthly,
        report.currency,
        report.errors.len()
    );
    Ok(report)
}

fn failure_reason(error: &EstimationError) -> &'static str {
    match error {
        EstimationError::NoParser(_) => "no_parser",
        EstimationError::Parse(_) => "parse",
        EstimationError::Cancelled => "cancelled",
    }
}

fn record_report_metrics(report: &Report, duration_secs: f64) {
    for resource in &report.resources {
        let outcome = match resource.pricing_status {
            PricingStatus::Priced => "priced",
            PricingStatus::Relaxed => "relaxed",
            PricingStatus::Estimated => "estimated",
            PricingStatus::Failed => "failed",
            PricingStatus::NoAdapter => "no_adapter",
            PricingStatus::Pending => "pending",
        };
        EstimationMetrics::record_resolution(&resource.provider, outcome);
    }
    for (provider, monthly) in &report.by_provider {
        EstimationMetrics::set_monthly_cost(provider, *monthly);
    }
    EstimationMetrics::record_run_completed(report.resources.len(), report.errors.len(), duration_secs);
}

fn write_output(output: &str, file: Option<&Path>) -> Result<()> {
    match file {
        Some(file) => {
            std::fs::write(file, output)
                .wrap_err_with(|| format!("Failed to write report to {}", file.display()))?;
            info!(path = %file.display(), "Report written");
        }
        None => println!("{output}"),
    }
    Ok(())
}
