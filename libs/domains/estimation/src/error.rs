use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type for price resolution
pub type PricingResult<T> = Result<T, PricingError>;

/// Result type for declaration parsing
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for a whole estimation run
pub type EstimationResult<T> = Result<T, EstimationError>;

/// Errors raised by a pricing catalog client.
///
/// Cloneable so an adapter can cache a failed handshake and hand the same
/// error to every later caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    /// Network-level failure
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// Non-success status from the catalog endpoint
    #[error("Catalog returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A single attempt exceeded its deadline
    #[error("Catalog query timed out after {0:?}")]
    Timeout(Duration),

    /// Response body could not be decoded
    #[error("Failed to parse catalog response: {0}")]
    Parse(String),

    /// Credentials or handshake rejected
    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Errors produced while pricing a single resource.
///
/// None of these abort an estimation run; they are recorded on the resource
/// and in the report's error list.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PricingError {
    #[error("unsupported resource type for pricing: {0}")]
    UnsupportedResourceType(String),

    #[error("{provider} pricing data unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("failed to get pricing data after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: CatalogError,
    },

    #[error("no pricing data found for resource: {0}")]
    NoPricingData(String),
}

impl PricingError {
    /// Short human-readable cause stored in the resource's pricing source
    pub fn diagnostic(&self) -> String {
        match self {
            PricingError::UnsupportedResourceType(_) => "Unsupported resource type".to_string(),
            PricingError::Unavailable { reason, .. } => reason.clone(),
            PricingError::Transport { source, .. } => source.to_string(),
            PricingError::NoPricingData(_) => "No pricing data found".to_string(),
        }
    }
}

/// Errors from declaration parsers
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid declaration in {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Errors that abort a whole estimation run
#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("no parser available for path: {0}")]
    NoParser(PathBuf),

    #[error("failed to parse IaC files: {0}")]
    Parse(#[from] ParseError),

    #[error("estimation cancelled before pricing completed")]
    Cancelled,
}
