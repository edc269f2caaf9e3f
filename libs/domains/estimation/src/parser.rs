//! Declaration parser plug-in point

use std::path::Path;
use std::sync::Arc;

use crate::error::ParseResult;
use crate::models::Declaration;

/// Reads IaC files into raw declarations
#[cfg_attr(test, mockall::automock)]
pub trait DeclarationParser: Send + Sync {
    /// Format name stored on the report, e.g. "terraform-plan"
    fn name(&self) -> &'static str;

    /// Whether this parser understands the file or directory at `path`
    fn can_handle(&self, path: &Path) -> bool;

    fn parse(&self, path: &Path) -> ParseResult<Vec<Declaration>>;
}

/// Ordered list of parsers; the first one that can handle a path wins
#[derive(Default, Clone)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn DeclarationParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parser: Arc<dyn DeclarationParser>) {
        self.parsers.push(parser);
    }

    pub fn with_parser(mut self, parser: Arc<dyn DeclarationParser>) -> Self {
        self.register(parser);
        self
    }

    pub fn find(&self, path: &Path) -> Option<Arc<dyn DeclarationParser>> {
        self.parsers.iter().find(|p| p.can_handle(path)).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(name: &'static str, extension: &'static str) -> Arc<dyn DeclarationParser> {
        let mut parser = MockDeclarationParser::new();
        parser.expect_name().return_const(name);
        parser
            .expect_can_handle()
            .returning(move |path| path.extension().is_some_and(|e| e == extension));
        Arc::new(parser)
    }

    #[test]
    fn test_first_matching_parser_wins() {
        let registry = ParserRegistry::new()
            .with_parser(parser("plan", "json"))
            .with_parser(parser("other", "json"));

        let found = registry.find(Path::new("plan.json")).unwrap();
        assert_eq!(found.name(), "plan");
        assert!(registry.find(Path::new("main.tf")).is_none());
        assert_eq!(registry.names(), vec!["plan", "other"]);
    }
}
