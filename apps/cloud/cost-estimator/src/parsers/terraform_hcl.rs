//! Terraform HCL parser
//!
//! Reads `resource "<type>" "<name>" { ... }` blocks from `.tf` files without
//! evaluating them. Only literal attribute values are kept: anything that
//! needs evaluation (variables, references, function calls, interpolated
//! strings) is skipped, as are nested blocks.

use domain_estimation::{AttributeValue, Declaration, DeclarationParser, ParseError, ParseResult};
use hcl::expr::{Expression, ObjectKey, TemplateExpr};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

fn is_terraform_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tf")
}

fn is_literal_template(text: &str) -> bool {
    !text.contains("${") && !text.contains("%{")
}

/// Literal value of an expression, `None` when it needs evaluation
fn literal(expr: &Expression) -> Option<AttributeValue> {
    match expr {
        Expression::Null => Some(AttributeValue::Null),
        Expression::Bool(b) => Some(AttributeValue::Bool(*b)),
        Expression::Number(n) => n.as_f64().map(AttributeValue::Number),
        Expression::String(s) if is_literal_template(s) => Some(AttributeValue::String(s.clone())),
        Expression::TemplateExpr(template) => match template.as_ref() {
            TemplateExpr::QuotedString(s) if is_literal_template(s) => {
                Some(AttributeValue::String(s.clone()))
            }
            _ => None,
        },
        Expression::Array(items) => items
            .iter()
            .map(literal)
            .collect::<Option<Vec<_>>>()
            .map(AttributeValue::List),
        Expression::Object(object) => {
            let mut map = BTreeMap::new();
            for (key, value) in object {
                let key = match key {
                    ObjectKey::Identifier(id) => id.as_str().to_string(),
                    ObjectKey::Expression(expr) => match literal(expr)? {
                        AttributeValue::String(s) => s,
                        _ => return None,
                    },
                    _ => return None,
                };
                map.insert(key, literal(value)?);
            }
            Some(AttributeValue::Map(map))
        }
        Expression::Parenthesis(inner) => literal(inner),
        _ => None,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HclParser;

impl HclParser {
    fn files(&self, path: &Path) -> ParseResult<Vec<PathBuf>> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        let entries = std::fs::read_dir(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let file = entry.path();
            if file.is_file() && is_terraform_file(&file) {
                files.push(file);
            }
        }
        files.sort();
        Ok(files)
    }

    fn parse_file(&self, path: &Path) -> ParseResult<Vec<Declaration>> {
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let body = hcl::parse(&content).map_err(|e| ParseError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut declarations = Vec::new();
        for block in body.blocks().filter(|block| block.identifier() == "resource") {
            let [resource_type, name] = block.labels() else {
                debug!(path = %path.display(), "Skipping resource block without type and name labels");
                continue;
            };

            let mut declaration = Declaration::new(resource_type.as_str(), name.as_str());
            for attribute in block.body().attributes() {
                match literal(attribute.expr()) {
                    Some(value) => {
                        declaration.attributes.insert(attribute.key().to_string(), value);
                    }
                    None => debug!(
                        resource_type = %declaration.resource_type,
                        name = %declaration.name,
                        attribute = attribute.key(),
                        "Skipping non-literal attribute"
                    ),
                }
            }
            declarations.push(declaration);
        }
        Ok(declarations)
    }
}

impl DeclarationParser for HclParser {
    fn name(&self) -> &'static str {
        "terraform"
    }

    /// A `.tf` file, or a directory holding at least one
    fn can_handle(&self, path: &Path) -> bool {
        if path.is_file() {
            return is_terraform_file(path);
        }
        self.files(path).is_ok_and(|files| !files.is_empty())
    }

    fn parse(&self, path: &Path) -> ParseResult<Vec<Declaration>> {
        let mut declarations = Vec::new();
        for file in self.files(path)? {
            let parsed = self.parse_file(&file)?;
            debug!(path = %file.display(), count = parsed.len(), "Parsed Terraform file");
            declarations.extend(parsed);
        }
        Ok(declarations)
    }
}
