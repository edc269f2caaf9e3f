//! IaC declaration parsers

pub mod declarations;
pub mod terraform_hcl;
pub mod terraform_plan;

use domain_estimation::{ParseError, ParseResult, ParserRegistry};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

pub use declarations::NativeDeclarationParser;
pub use terraform_hcl::HclParser;
pub use terraform_plan::TerraformPlanParser;

const DECLARATIONS_SUFFIX: &str = ".declarations.json";

/// Parsers in match order
pub fn build_parsers() -> ParserRegistry {
    ParserRegistry::new()
        .with_parser(Arc::new(NativeDeclarationParser))
        .with_parser(Arc::new(TerraformPlanParser))
        .with_parser(Arc::new(HclParser))
}

fn is_declarations_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(DECLARATIONS_SUFFIX))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> ParseResult<T> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ParseError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_order() {
        assert_eq!(build_parsers().names(), vec!["native", "terraform-plan", "terraform"]);
    }

    #[test]
    fn test_declarations_suffix() {
        assert!(is_declarations_file(Path::new("infra/app.declarations.json")));
        assert!(!is_declarations_file(Path::new("infra/plan.json")));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_json::<serde_json::Value>(Path::new("/does/not/exist.json")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
