//! AST ingestion: serde-tagged node types produced by the external parser.
//!
//! The lexer/parser is a separate component; it hands the compiler a
//! JSON-encoded AST. `parse_source_file` is the ingestion entry point.

pub mod types;

pub use types::*;

use crate::error::CompilerError;

/// Deserialize one source file's AST from parser JSON.
pub fn parse_source_file(path: &str, json: &str) -> Result<SourceFile, Vec<CompilerError>> {
    match serde_json::from_str::<Vec<Block>>(json) {
        Ok(blocks) => Ok(SourceFile {
            path: path.to_string(),
            blocks,
        }),
        Err(e) => Err(vec![CompilerError::parse(
            "P001",
            format!("Failed to parse AST JSON: {}", e),
            Some(path.to_string()),
        )]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shared_block() {
        let json = r#"[
            {"type": "SharedBlock", "body": [
                {"type": "ReturnStatement", "loc": {"line": 1, "column": 0}, "value": null}
            ]}
        ]"#;
        let file = parse_source_file("app.tova", json).unwrap();
        assert_eq!(file.blocks.len(), 1);
        assert!(matches!(file.blocks[0], Block::SharedBlock(_)));
    }

    #[test]
    fn bad_json_reports_parse_error() {
        let errors = parse_source_file("app.tova", "{nope").unwrap_err();
        assert_eq!(errors[0].code, "P001");
        assert_eq!(errors[0].file.as_deref(), Some("app.tova"));
    }
}
