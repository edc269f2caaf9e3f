//! Estimation Domain
//!
//! Turns loosely structured IaC declarations into a priced cost report.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  Estimator   │  ← parse → infer → price → aggregate
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │  Inference   │  ← size / region / quantity / tags from attributes
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │  Resolver    │  ← pricing adapters over a catalog client (tiered)
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ Aggregation  │  ← totals and breakdowns
//! └──────────────┘
//! ```

pub mod aggregation;
pub mod calibration;
pub mod catalog;
pub mod comparison;
pub mod error;
pub mod inference;
pub mod models;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod service;

// Re-export commonly used types
pub use aggregation::Report;
pub use calibration::{CalibrationRule, CalibrationTable};
pub use catalog::{CatalogClient, CatalogEntry, Filter, FilterType, PriceQuery};
pub use comparison::{Change, ReportDiff, ResourceDiff, compare_reports};
pub use error::{
    CatalogError, CatalogResult, EstimationError, EstimationResult, ParseError, ParseResult,
    PricingError, PricingResult,
};
pub use inference::enrich;
pub use models::{
    AttributeValue, Attributes, Declaration, PriceComponent, PricingDetails, PricingStatus,
    Resource,
};
pub use parser::{DeclarationParser, ParserRegistry};
pub use registry::AdapterRegistry;
pub use resolver::{
    AdapterState, CatalogPricingAdapter, PricingAdapter, PricingProfile, ServiceClass, ServiceKind,
};
pub use retry::RetryPolicy;
pub use service::Estimator;
