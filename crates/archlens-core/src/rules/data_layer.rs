//! Model-assisted review of a component's data-access modules.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::AnalyzerRule;
use crate::error::{AnalysisError, UpstreamError};
use crate::graph::ModuleDependencyGraph;
use crate::layer::derived_file_path;
use crate::model::ModelClient;

const DEFAULT_MAX_FILE_CHARS: usize = 10_000;

/// Asks the analyzer which modules form the data-access layer, then has it
/// review each of those files. The result is the list of per-file reviews.
pub struct DataLayerRule {
    max_file_chars: usize,
}

impl DataLayerRule {
    pub fn new(max_file_chars: usize) -> Self {
        Self { max_file_chars }
    }
}

impl Default for DataLayerRule {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_CHARS)
    }
}

impl AnalyzerRule for DataLayerRule {
    fn name(&self) -> &'static str {
        "check_data_layer"
    }

    fn analyze(
        &self,
        graph: &ModuleDependencyGraph,
        component_root: &Path,
        analyzer: &dyn ModelClient,
    ) -> Result<Value, UpstreamError> {
        let import_map = serde_json::to_string_pretty(graph)
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        let answer = analyzer.complete_json(&module_selection_prompt(&import_map))?;
        let modules = parse_module_list(&answer)?;
        debug!(
            component = %component_root.display(),
            count = modules.len(),
            "analyzer selected data-access modules"
        );

        let mut reviews = Vec::new();
        for module in modules {
            let path = module_file(component_root, &module);
            if !path.is_file() {
                let err = AnalysisError::MissingFile {
                    module: module.clone(),
                    path,
                };
                warn!("{err}; skipping");
                continue;
            }
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(source) => {
                    warn!("{}; skipping", AnalysisError::Io { path, source });
                    continue;
                }
            };
            let excerpt: String = content.chars().take(self.max_file_chars).collect();
            let display_path = path.display().to_string();
            reviews.push(analyzer.complete_json(&file_review_prompt(&display_path, &excerpt))?);
        }
        Ok(Value::Array(reviews))
    }
}

/// File a module identifier maps to under the component root.
fn module_file(component_root: &Path, module: &str) -> PathBuf {
    component_root.join(derived_file_path(module))
}

fn parse_module_list(answer: &Value) -> Result<Vec<String>, UpstreamError> {
    let items = answer.as_array().ok_or_else(|| {
        UpstreamError::InvalidResponse(format!("expected a JSON list of modules, got {answer}"))
    })?;
    Ok(items
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

fn module_selection_prompt(import_map: &str) -> String {
    format!(
        "Find the modules responsible for data access (the data layer) in this Python service.\n\
         Answer with a JSON list of module names only, for example: [\"module1\", \"module2\"].\n\n\
         Import map of the project (key is a module name, value is the list of modules it imports):\n\n\
         {import_map}\n\n\
         JSON list:"
    )
}

fn file_review_prompt(file_path: &str, content: &str) -> String {
    format!(
        "Review the data-access code in the file below.\n\
         - Which datasource types does it use?\n\
         - Which data-access pattern does it follow (Unit of Work, Repository, ORM, Active Record, ...), if any?\n\
         - List errors, warnings and other issues with a location and a fix for each.\n\
         - If the file has no data-access code, return an empty issues list.\n\n\
         Answer with valid JSON in this shape:\n\
         {{\"file_path\": \"{file_path}\", \"datasource_types\": [\"...\"], \"pattern\": \"...\" or null, \
         \"issues\": [{{\"description\": \"...\", \"location\": \"...\", \"how_to_fix\": \"...\"}}]}}\n\n\
         {file_path}:\n\n\
         {content}\n\n\
         JSON answer:"
    )
}
