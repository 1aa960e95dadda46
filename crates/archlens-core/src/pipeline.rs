use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analyzer::ImportExtractor;
use crate::cache::{CachedImports, ImportCache};
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::engine::RuleEngine;
use crate::error::AnalysisError;
use crate::graph::ModuleDependencyGraph;
use crate::indexer::{normalize_rel_path, SourceIndexer};
use crate::layer::LayerClassifier;
use crate::report::{ComponentRecord, ProjectReport};
use crate::rules::ComponentContext;
use crate::types::{ImportRecord, ParseFailure, ParseStatus};

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Component roots to analyze, relative to the project root. Empty means
    /// use the configured components, or the project root itself.
    pub components: Vec<PathBuf>,
    /// Reuse and update the on-disk import cache.
    pub incremental: bool,
    pub cancel: CancellationToken,
}

type FileResult = (ImportRecord, Option<(String, CachedImports)>);

/// Import records of one component plus the cache entries they produced.
struct Extraction {
    records: Vec<ImportRecord>,
    fresh: Vec<(String, CachedImports)>,
}

/// Indexes files, extracts imports, builds graphs and dispatches rules.
pub struct AnalysisPipeline {
    extractors: Vec<Box<dyn ImportExtractor>>,
    config: Config,
    indexer: SourceIndexer,
    classifier: LayerClassifier,
    engine: RuleEngine,
}

impl AnalysisPipeline {
    pub fn new(extractors: Vec<Box<dyn ImportExtractor>>, config: Config, engine: RuleEngine) -> Self {
        let indexer = SourceIndexer::new(&config.project);
        let classifier = LayerClassifier::new(&config.layers);
        Self {
            extractors,
            config,
            indexer,
            classifier,
            engine,
        }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Analyze a project. A component that fails is logged and left out of
    /// the report; cancellation aborts the whole run.
    pub fn analyze(
        &self,
        project_root: &Path,
        options: &AnalyzeOptions,
    ) -> Result<ProjectReport, AnalysisError> {
        let project_files = self.indexer.project_files(project_root);
        info!(
            project = %project_root.display(),
            files = project_files.len(),
            "indexed project"
        );

        let dispatch = self.engine.dispatch_summary();
        let project_properties = self.engine.apply_project_rules(&project_files);

        let mut cache = if options.incremental {
            ImportCache::load(project_root).unwrap_or_else(|e| {
                warn!("ignoring import cache: {e:#}");
                ImportCache::new()
            })
        } else {
            ImportCache::new()
        };

        let components = self.resolve_components(project_root, &options.components);
        let cache_ref = options.incremental.then_some(&cache);
        let results: Vec<Result<(ComponentRecord, Extraction), AnalysisError>> = components
            .par_iter()
            .map(|component| -> Result<(ComponentRecord, Extraction), AnalysisError> {
                let extraction =
                    self.extract_component(project_root, component, cache_ref, &options.cancel)?;
                options.cancel.check()?;
                let record = self.analyze_component(
                    project_root,
                    component,
                    &project_files,
                    &extraction.records,
                );
                Ok((record, extraction))
            })
            .collect();

        let mut report_components = Vec::new();
        let mut parse_failures = Vec::new();
        let mut fresh_entries = Vec::new();
        for (component, result) in components.iter().zip(results) {
            match result {
                Ok((record, extraction)) => {
                    parse_failures.extend(extraction.records.iter().filter_map(|r| match &r.status {
                        ParseStatus::Unparseable { diagnostic } => Some(ParseFailure {
                            component: record.path.clone(),
                            path: r.path.clone(),
                            diagnostic: diagnostic.clone(),
                        }),
                        ParseStatus::Parsed => None,
                    }));
                    fresh_entries.extend(extraction.fresh);
                    report_components.push(record);
                }
                Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
                Err(e) => warn!(component = %component.display(), "failed to analyze component: {e}"),
            }
        }

        if options.incremental {
            for (path, entry) in fresh_entries {
                cache.insert(path, entry);
            }
            let dropped = cache.retain_project_files(&project_files);
            debug!(cached = cache.files.len(), dropped, "updating import cache");
            if let Err(e) = cache.save(project_root) {
                warn!("failed to save import cache: {e:#}");
            }
        }

        Ok(ProjectReport {
            generated_at: chrono::Utc::now(),
            project_files,
            project_properties,
            components: report_components,
            parse_failures,
            dispatch,
        })
    }

    /// Component roots to analyze, relative to the project root.
    ///
    /// Explicitly requested components win, then `project.components`, then
    /// directories matching `project.components_pattern`, and finally the
    /// project root itself.
    pub fn resolve_components(&self, project_root: &Path, requested: &[PathBuf]) -> Vec<PathBuf> {
        let candidates: Vec<PathBuf> = if !requested.is_empty() {
            requested
                .iter()
                .map(|p| p.strip_prefix(project_root).unwrap_or(p).to_path_buf())
                .collect()
        } else if !self.config.project.components.is_empty() {
            self.config.project.components.iter().map(PathBuf::from).collect()
        } else if let Some(pattern) = &self.config.project.components_pattern {
            let found = discover_components(project_root, pattern);
            if found.is_empty() {
                warn!(pattern = %pattern, "no components match pattern; analyzing the project root");
            }
            found
                .iter()
                .filter_map(|p| p.strip_prefix(project_root).ok().map(Path::to_path_buf))
                .collect()
        } else {
            Vec::new()
        };

        let mut components: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|c| {
                let exists = project_root.join(c).is_dir();
                if !exists {
                    warn!(component = %c.display(), "component directory does not exist; skipping");
                }
                exists
            })
            .collect();
        if components.is_empty() {
            components.push(PathBuf::from("."));
        }
        components
    }

    /// Import records for every source file of a component. Files that cannot
    /// be read or parsed get empty, unparseable records. All-or-nothing with
    /// respect to cancellation.
    fn extract_component(
        &self,
        project_root: &Path,
        component: &Path,
        cache: Option<&ImportCache>,
        cancel: &CancellationToken,
    ) -> Result<Extraction, AnalysisError> {
        let component_root = project_root.join(component);
        let mut records = Vec::new();
        let mut fresh = Vec::new();

        for extractor in &self.extractors {
            let files = self
                .indexer
                .source_files(&component_root, extractor.file_extensions());
            debug!(
                component = %component.display(),
                language = extractor.language(),
                files = files.len(),
                "extracting imports"
            );

            let results: Vec<FileResult> = files
                .par_iter()
                .map(|rel| -> Result<FileResult, AnalysisError> {
                    cancel.check()?;
                    let project_rel = normalize_rel_path(&component.join(rel));
                    let mut file = match self.indexer.read(&component_root, rel) {
                        Ok(f) => f,
                        Err(e) => {
                            warn!(file = %project_rel, "{e}");
                            return Ok((ImportRecord::unparseable(project_rel, e.to_string()), None));
                        }
                    };
                    if let Some(hit) = cache.and_then(|c| c.get(&project_rel, &file.content)) {
                        let record = ImportRecord {
                            path: project_rel,
                            imports: hit.imports.clone(),
                            status: hit.status.clone(),
                        };
                        return Ok((record, None));
                    }
                    file.path = PathBuf::from(&project_rel);
                    let record = extractor.import_record(&file);
                    let entry = cache
                        .is_some()
                        .then(|| (project_rel, CachedImports::new(&file.content, &record)));
                    Ok((record, entry))
                })
                .collect::<Result<_, AnalysisError>>()?;

            for (record, entry) in results {
                records.push(record);
                fresh.extend(entry);
            }
        }

        Ok(Extraction { records, fresh })
    }

    /// Build the component's graph and run the per-component rules over it.
    fn analyze_component(
        &self,
        project_root: &Path,
        component: &Path,
        project_files: &[String],
        records: &[ImportRecord],
    ) -> ComponentRecord {
        let graph = ModuleDependencyGraph::build(records, component);
        let layers = self.classifier.assign(&graph);
        let name = match normalize_rel_path(component) {
            n if n.is_empty() => ".".to_string(),
            n => n,
        };
        debug!(
            component = %name,
            modules = graph.len(),
            edges = graph.edge_count(),
            "built module graph"
        );

        let absolute_root = project_root.join(component);
        let ctx = ComponentContext {
            root: component,
            absolute_root: &absolute_root,
            project_files,
            classifier: &self.classifier,
        };
        let mut record = ComponentRecord::new(name, ModuleDependencyGraph::new(), layers);
        self.engine.apply_component_rules(&mut record, &graph, &ctx);
        record.import_dependencies_graph = graph;
        record
    }
}

/// Directories under `project_root` matching a glob such as `services/*`.
pub fn discover_components(project_root: &Path, pattern: &str) -> Vec<PathBuf> {
    let full_pattern = project_root.join(pattern).to_string_lossy().to_string();
    let mut dirs: Vec<PathBuf> = match glob::glob(&full_pattern) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).filter(|p| p.is_dir()).collect(),
        Err(e) => {
            warn!(pattern = %pattern, "invalid components pattern: {e}");
            Vec::new()
        }
    };
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ParsedFile;
    use crate::config::RulesConfig;
    use crate::rules::RuleRegistry;
    use crate::types::SourceFile;
    use std::fs;

    /// Line-based stand-in for a real grammar: `import x` lines are imports,
    /// a file containing `!!` is a syntax error.
    struct LineExtractor;

    impl ImportExtractor for LineExtractor {
        fn language(&self) -> &'static str {
            "python"
        }

        fn file_extensions(&self) -> &[&str] {
            &["py"]
        }

        fn parse_file(&self, path: &Path, _content: &str) -> Result<ParsedFile, AnalysisError> {
            Err(AnalysisError::Parse {
                path: path.to_path_buf(),
                diagnostic: "no grammar".to_string(),
            })
        }

        fn extract_imports(&self, _parsed: &ParsedFile) -> Vec<String> {
            Vec::new()
        }

        fn import_record(&self, file: &SourceFile) -> ImportRecord {
            let path = normalize_rel_path(&file.path);
            if file.content.contains("!!") {
                return ImportRecord::unparseable(path, "syntax error at 1:1");
            }
            let imports = file
                .content
                .lines()
                .filter_map(|l| l.strip_prefix("import "))
                .map(|m| m.trim().to_string())
                .collect();
            ImportRecord::parsed(path, imports)
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn pipeline(config: Config) -> AnalysisPipeline {
        let engine = RuleEngine::new(
            RuleRegistry::builtin(&config.analyzer),
            &RulesConfig::default(),
        );
        AnalysisPipeline::new(vec![Box::new(LineExtractor)], config, engine)
    }

    fn hexagonal_project() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "domain/order.py", "import adapters.db\n");
        write(tmp.path(), "adapters/db.py", "");
        write(tmp.path(), "application/service.py", "import domain.order\n");
        write(tmp.path(), ".gitignore", "__pycache__\n");
        tmp
    }

    #[test]
    fn test_analyze_project_root_as_single_component() {
        let tmp = hexagonal_project();
        let report = pipeline(Config::default())
            .analyze(tmp.path(), &AnalyzeOptions::default())
            .unwrap();

        assert_eq!(report.components.len(), 1);
        let component = &report.components[0];
        assert_eq!(component.path, ".");
        let graph = serde_json::to_value(&component.import_dependencies_graph).unwrap();
        assert_eq!(
            graph,
            serde_json::json!({
                "adapters.db": [],
                "application.service": ["domain.order"],
                "domain.order": ["adapters.db"],
            })
        );
        assert_eq!(
            component.architecture_notes["hexagonal_architecture_comments"],
            vec!["Hexagonal Architecture Violation: domain module 'domain.order' depends on 'adapters.db' from layer 'adapters'"]
        );
        assert_eq!(
            report.project_properties.get("have_gitignore_file"),
            Some(&serde_json::Value::Bool(true))
        );
        assert!(report.dispatch.skipped.iter().any(|s| s.name == "check_data_layer"));
    }

    #[test]
    fn test_corrupt_file_among_ten() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..9 {
            write(tmp.path(), &format!("pkg/m{i}.py"), "import os\n");
        }
        write(tmp.path(), "pkg/broken.py", "def !!\n");

        let report = pipeline(Config::default())
            .analyze(tmp.path(), &AnalyzeOptions::default())
            .unwrap();
        let graph = &report.components[0].import_dependencies_graph;
        assert_eq!(graph.len(), 10);
        assert!(graph.dependencies("pkg.broken").unwrap().is_empty());
        assert_eq!(report.parse_failures.len(), 1);
        assert_eq!(report.parse_failures[0].path, "pkg/broken.py");
    }

    /// Make `path` unreadable. False when the current user can read it anyway.
    #[cfg(unix)]
    fn lock(path: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
        fs::read(path).is_err()
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_becomes_unparseable_node() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "pkg/ok.py", "import os\n");
        write(tmp.path(), "pkg/locked.py", "import sys\n");
        let locked = tmp.path().join("pkg/locked.py");
        if !lock(&locked) {
            // Permission bits do not apply to this user
            return;
        }

        let result = pipeline(Config::default()).analyze(tmp.path(), &AnalyzeOptions::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        let report = result.unwrap();

        let graph = &report.components[0].import_dependencies_graph;
        assert_eq!(graph.len(), 2);
        assert!(graph.dependencies("pkg.locked").unwrap().is_empty());
        assert!(graph.dependencies("pkg.ok").unwrap().contains("os"));
        assert_eq!(report.parse_failures.len(), 1);
        assert_eq!(report.parse_failures[0].path, "pkg/locked.py");
        assert!(report.parse_failures[0].diagnostic.contains("failed to read"));
    }

    #[test]
    fn test_components_from_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "services/orders/domain/order.py", "import json\n");
        write(tmp.path(), "services/billing/app.py", "import jwt\n");

        let mut config = Config::default();
        config.project.components_pattern = Some("services/*".to_string());
        let report = pipeline(config)
            .analyze(tmp.path(), &AnalyzeOptions::default())
            .unwrap();

        let paths: Vec<&str> = report.components.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["services/billing", "services/orders"]);
        // Module ids are relative to the component root
        assert!(report.components[1]
            .import_dependencies_graph
            .contains_module("domain.order"));
        assert_eq!(
            report.components[0].properties.get("have_jwt_authorization"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn test_missing_requested_component_falls_back_to_root() {
        let tmp = hexagonal_project();
        let p = pipeline(Config::default());
        let resolved = p.resolve_components(tmp.path(), &[PathBuf::from("nope")]);
        assert_eq!(resolved, vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_cancelled_run_returns_no_report() {
        let tmp = hexagonal_project();
        let options = AnalyzeOptions::default();
        options.cancel.cancel();
        let err = pipeline(Config::default())
            .analyze(tmp.path(), &options)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[test]
    fn test_incremental_run_writes_and_reuses_cache() {
        let tmp = hexagonal_project();
        let options = AnalyzeOptions {
            incremental: true,
            ..Default::default()
        };
        let first = pipeline(Config::default())
            .analyze(tmp.path(), &options)
            .unwrap();

        let cache = ImportCache::load(tmp.path()).unwrap();
        assert!(cache.files.contains_key("domain/order.py"));

        let second = pipeline(Config::default())
            .analyze(tmp.path(), &options)
            .unwrap();
        assert_eq!(
            first.components[0].import_dependencies_graph,
            second.components[0].import_dependencies_graph
        );
    }
}
