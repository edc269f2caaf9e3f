//! Native declaration files
//!
//! A `*.declarations.json` file holds a JSON array of declarations:
//!
//! ```json
//! [{ "type": "aws_instance", "name": "web", "attributes": { "instance_type": "t3.micro" } }]
//! ```
//!
//! A directory is read file by file in name order.

use domain_estimation::{Declaration, DeclarationParser, ParseError, ParseResult};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{is_declarations_file, read_json};

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDeclarationParser;

impl NativeDeclarationParser {
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
            if file.is_file() && is_declarations_file(&file) {
                files.push(file);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl DeclarationParser for NativeDeclarationParser {
    fn name(&self) -> &'static str {
        "native"
    }

    fn can_handle(&self, path: &Path) -> bool {
        if path.is_file() {
            return is_declarations_file(path);
        }
        self.files(path).is_ok_and(|files| !files.is_empty())
    }

    fn parse(&self, path: &Path) -> ParseResult<Vec<Declaration>> {
        let mut declarations = Vec::new();
        for file in self.files(path)? {
            let parsed: Vec<Declaration> = read_json(&file)?;
            debug!(path = %file.display(), count = parsed.len(), "Parsed declaration file");
            declarations.extend(parsed);
        }
        Ok(declarations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "app.declarations.json",
            r#"[{ "type": "aws_instance", "name": "web", "attributes": { "instance_type": "t3.micro", "count": 2 } },
                { "type": "aws_s3_bucket", "name": "assets" }]"#,
        );

        let parser = NativeDeclarationParser;
        assert!(parser.can_handle(&file));

        let declarations = parser.parse(&file).unwrap();
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].attributes["count"].as_f64(), Some(2.0));
        assert!(declarations[1].attributes.is_empty());
    }

    #[test]
    fn test_parse_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.declarations.json", r#"[{ "type": "aws_instance", "name": "b" }]"#);
        write(dir.path(), "a.declarations.json", r#"[{ "type": "aws_instance", "name": "a" }]"#);
        write(dir.path(), "notes.json", r#"{ "ignored": true }"#);

        let parser = NativeDeclarationParser;
        assert!(parser.can_handle(dir.path()));

        let names: Vec<String> = parser
            .parse(dir.path())
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_directory_is_not_handled() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!NativeDeclarationParser.can_handle(dir.path()));
    }

    #[test]
    fn test_malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "bad.declarations.json", r#"{ "type": "aws_instance" }"#);

        let err = NativeDeclarationParser.parse(&file).unwrap_err();
        assert!(matches!(err, ParseError::Json { .. }));
    }
}
