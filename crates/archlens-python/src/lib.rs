use std::path::Path;

use anyhow::{Context, Result};
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use archlens_core::analyzer::{ImportExtractor, ParsedFile};
use archlens_core::error::AnalysisError;

/// Python import extractor using tree-sitter.
///
/// Module names are recorded the way Python's own AST reports them:
/// `import a.b as c` gives `a.b`, `from .pkg import x` gives `pkg`, and
/// `from . import x` gives nothing.
pub struct PythonImportExtractor {
    language: Language,
    import_query: Query,
    legacy_query: Query,
}

impl PythonImportExtractor {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_python::LANGUAGE.into();

        let import_query = Query::new(
            &language,
            r#"
            (import_statement
              name: (dotted_name) @module)
            (import_statement
              name: (aliased_import
                name: (dotted_name) @module))
            (import_from_statement
              module_name: (dotted_name) @module)
            (import_from_statement
              module_name: (relative_import
                (dotted_name) @module))
            (future_import_statement) @future
            "#,
        )
        .context("failed to compile import query")?;

        // Python 2 statements the grammar still accepts.
        let legacy_query = Query::new(
            &language,
            r#"
            [(print_statement) (exec_statement)] @legacy
            "#,
        )
        .context("failed to compile legacy statement query")?;

        Ok(Self {
            language,
            import_query,
            legacy_query,
        })
    }
}

impl ImportExtractor for PythonImportExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &[&str] {
        &["py"]
    }

    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, AnalysisError> {
        let parse_error = |diagnostic: String| AnalysisError::Parse {
            path: path.to_path_buf(),
            diagnostic,
        };

        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| parse_error(format!("failed to set Python language: {e}")))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| parse_error("parser produced no tree".to_string()))?;

        if let Some(node) = first_error(tree.root_node()) {
            let pos = node.start_position();
            let kind = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "syntax error".to_string()
            };
            return Err(parse_error(format!(
                "{kind} at line {}, column {}",
                pos.row + 1,
                pos.column + 1
            )));
        }

        let legacy = {
            let mut cursor = QueryCursor::new();
            let mut matches =
                cursor.matches(&self.legacy_query, tree.root_node(), content.as_bytes());
            matches.next().and_then(|m| m.captures.first()).map(|c| c.node)
        };
        if let Some(node) = legacy {
            let pos = node.start_position();
            return Err(parse_error(format!(
                "Python 2 {} at line {}, column {}",
                node.kind().replace('_', " "),
                pos.row + 1,
                pos.column + 1
            )));
        }

        Ok(ParsedFile {
            path: path.to_path_buf(),
            tree,
            content: content.to_string(),
        })
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> Vec<String> {
        let names = self.import_query.capture_names();
        let future_idx = names.iter().position(|n| *n == "future");

        let mut found: Vec<(usize, String)> = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(
            &self.import_query,
            parsed.tree.root_node(),
            parsed.content.as_bytes(),
        );
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let module = if Some(capture.index as usize) == future_idx {
                    "__future__".to_string()
                } else {
                    dotted_name_text(node, &parsed.content)
                };
                found.push((node.start_byte(), module));
            }
        }

        found.sort_by_key(|(offset, _)| *offset);
        found.into_iter().map(|(_, module)| module).collect()
    }
}

/// First error or missing node in document order. Walks with a cursor so
/// deeply nested input cannot exhaust the stack.
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

/// `a . b` and `a.b` name the same module.
fn dotted_name_text(node: Node<'_>, source: &str) -> String {
    source[node.byte_range()].split_whitespace().collect()
}
