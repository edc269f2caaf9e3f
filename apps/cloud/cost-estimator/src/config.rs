//! Configuration for the cost estimator

use core_config::{ConfigError, FromEnv, env_optional, env_or_default, env_parse};
use domain_estimation::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub estimator: EstimatorConfig,
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    /// Resources priced concurrently
    pub concurrency: usize,
    pub max_attempts: u32,
    /// Linear backoff unit between catalog query attempts
    pub backoff: Duration,
    /// Deadline for one catalog query attempt.
    ///
    /// Does not cover bulk offer downloads, see [`AwsConfig::download_timeout`].
    pub query_timeout: Duration,
    /// Region for resources where none could be inferred
    pub default_region: Option<String>,
}

impl EstimatorConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_backoff_unit(self.backoff)
            .with_attempt_timeout(self.query_timeout)
    }
}

impl FromEnv for EstimatorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            concurrency: env_parse("ESTIMATOR_CONCURRENCY", 8)?,
            max_attempts: env_parse("ESTIMATOR_MAX_ATTEMPTS", 3)?,
            backoff: Duration::from_millis(env_parse("ESTIMATOR_BACKOFF_MS", 500)?),
            query_timeout: Duration::from_secs(env_parse("ESTIMATOR_QUERY_TIMEOUT_SECS", 30)?),
            default_region: env_optional("ESTIMATOR_DEFAULT_REGION"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AwsConfig {
    /// Enable AWS pricing
    pub enabled: bool,
    /// Base URL of the Price List bulk API
    pub endpoint: String,
    /// Region queried when a request carries no region filter
    pub pricing_region: String,
    /// Catalog entries returned per query
    pub max_results: usize,
    /// Directory holding downloaded offer files
    pub offer_cache_dir: PathBuf,
    /// Age after which a cached offer file is downloaded again
    pub offer_cache_ttl: Duration,
    /// Deadline for downloading one offer file.
    ///
    /// Regional offer files run from a few MB to several GB (AmazonEC2), so
    /// downloads are streamed to `offer_cache_dir` under this limit instead
    /// of the per-query timeout, then parsed from disk.
    pub download_timeout: Duration,
}

fn default_offer_cache_dir() -> PathBuf {
    std::env::temp_dir().join("cost-estimator").join("aws-offers")
}

fn default_aws_endpoint() -> &'static str {
    "https://pricing.us-east-1.amazonaws.com"
}

fn default_aws_region() -> &'static str {
    "us-east-1"
}

impl FromEnv for AwsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: env_parse("AWS_ENABLED", true)?,
            endpoint: env_or_default("AWS_PRICING_ENDPOINT", default_aws_endpoint())
                .trim_end_matches('/')
                .to_string(),
            pricing_region: env_or_default("AWS_PRICING_REGION", default_aws_region()),
            max_results: env_parse("AWS_MAX_RESULTS", domain_estimation::catalog::DEFAULT_MAX_RESULTS)?,
            offer_cache_dir: env_optional("AWS_OFFER_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_offer_cache_dir),
            offer_cache_ttl: Duration::from_secs(env_parse("AWS_OFFER_CACHE_TTL_HOURS", 24u64)? * 3600),
            download_timeout: Duration::from_secs(env_parse("AWS_OFFER_DOWNLOAD_TIMEOUT_SECS", 900)?),
        })
    }
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            estimator: EstimatorConfig::from_env()?,
            aws: AwsConfig::from_env()?,
        })
    }
}
