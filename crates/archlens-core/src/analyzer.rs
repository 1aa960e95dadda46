use std::path::{Path, PathBuf};

use tracing::warn;
use tree_sitter::Tree;

use crate::error::AnalysisError;
use crate::indexer::normalize_rel_path;
use crate::types::{ImportRecord, SourceFile};

/// A parsed source file with its tree-sitter AST and original content.
pub struct ParsedFile {
    pub path: PathBuf,
    pub tree: Tree,
    pub content: String,
}

/// Trait that each language's import extractor must implement.
pub trait ImportExtractor: Send + Sync {
    /// Language name (e.g., "python")
    fn language(&self) -> &'static str;

    /// File extensions this extractor handles (e.g., &["py"])
    fn file_extensions(&self) -> &[&str];

    /// Parse a source file into a ParsedFile. A tree containing syntax
    /// errors is reported as `AnalysisError::Parse`.
    fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, AnalysisError>;

    /// Module names the file statically imports, in source order.
    fn extract_imports(&self, parsed: &ParsedFile) -> Vec<String>;

    /// Parse and extract in one step. Parse failures never escape: the file
    /// gets an empty, unparseable record and the failure is logged.
    fn import_record(&self, file: &SourceFile) -> ImportRecord {
        let rel_path = normalize_rel_path(&file.path);
        match self.parse_file(&file.path, &file.content) {
            Ok(parsed) => ImportRecord::parsed(rel_path, self.extract_imports(&parsed)),
            Err(e) => {
                warn!(file = %rel_path, language = self.language(), "{e}");
                ImportRecord::unparseable(rel_path, e.to_string())
            }
        }
    }
}
