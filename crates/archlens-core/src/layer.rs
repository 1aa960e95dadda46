use std::collections::HashSet;

use crate::config::LayersConfig;
use crate::graph::ModuleDependencyGraph;
use crate::types::{Layer, LayerAssignment};

/// Extension appended to a module identifier to rebuild its file path.
const MODULE_FILE_EXTENSION: &str = "py";

/// Classifies modules into architectural layers by directory keywords.
///
/// A module belongs to the first group (domain, application, adapters,
/// config) that has a keyword equal to one of the segments of its derived
/// file path. Matching is case-sensitive. Modules matching no group are
/// `Layer::Other`. When a path could match several groups, e.g.
/// `core/config/loader.py`, group order decides.
pub struct LayerClassifier {
    groups: Vec<(Layer, HashSet<String>)>,
}

impl LayerClassifier {
    pub fn new(config: &LayersConfig) -> Self {
        let group = |words: &[String]| words.iter().cloned().collect::<HashSet<_>>();
        Self {
            groups: vec![
                (Layer::Domain, group(&config.domain)),
                (Layer::Application, group(&config.application)),
                (Layer::Adapters, group(&config.adapters)),
                (Layer::Config, group(&config.config)),
            ],
        }
    }

    /// Classify one module identifier.
    pub fn classify(&self, module: &str) -> Layer {
        let path = derived_file_path(module);
        let segments: Vec<&str> = path.split('/').collect();
        for (layer, words) in &self.groups {
            if segments.iter().any(|s| words.contains(*s)) {
                return *layer;
            }
        }
        Layer::Other
    }

    /// Assign a layer to every local module (every key) of the graph.
    pub fn assign(&self, graph: &ModuleDependencyGraph) -> LayerAssignment {
        graph
            .modules()
            .map(|module| (module.to_string(), self.classify(module)))
            .collect()
    }
}

impl Default for LayerClassifier {
    fn default() -> Self {
        Self::new(&LayersConfig::default())
    }
}

/// Rebuild the file path a module identifier was derived from.
pub fn derived_file_path(module: &str) -> String {
    format!("{}.{MODULE_FILE_EXTENSION}", module.replace('.', "/"))
}

/// Layer of `module` in `assignment`; modules outside it are `Other`.
pub fn layer_of(assignment: &LayerAssignment, module: &str) -> Layer {
    assignment.get(module).copied().unwrap_or(Layer::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_default_keywords() {
        let classifier = LayerClassifier::default();

        assert_eq!(classifier.classify("domain.order"), Layer::Domain);
        assert_eq!(classifier.classify("app.core.money"), Layer::Domain);
        assert_eq!(classifier.classify("application.service"), Layer::Application);
        assert_eq!(classifier.classify("svc.use_cases.create"), Layer::Application);
        assert_eq!(classifier.classify("adapters.db"), Layer::Adapters);
        assert_eq!(classifier.classify("infrastructure.repo"), Layer::Adapters);
        assert_eq!(classifier.classify("settings.base"), Layer::Config);
        assert_eq!(classifier.classify("main"), Layer::Other);
    }

    #[test]
    fn test_file_name_is_not_a_directory_keyword() {
        let classifier = LayerClassifier::default();
        // `config.py` at the root is not inside a `config` directory
        assert_eq!(classifier.classify("config"), Layer::Other);
        assert_eq!(classifier.classify("app.domain"), Layer::Other);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let classifier = LayerClassifier::default();
        assert_eq!(classifier.classify("Domain.order"), Layer::Other);
    }

    #[test]
    fn test_first_group_wins() {
        let classifier = LayerClassifier::default();
        assert_eq!(classifier.classify("core.config.loader"), Layer::Domain);
        assert_eq!(classifier.classify("config.core.loader"), Layer::Domain);
        assert_eq!(classifier.classify("settings.adapters.env"), Layer::Adapters);
    }

    #[test]
    fn test_custom_keywords() {
        let config = LayersConfig {
            domain: vec!["kernel".to_string()],
            ..LayersConfig::default()
        };
        let classifier = LayerClassifier::new(&config);
        assert_eq!(classifier.classify("kernel.user"), Layer::Domain);
        assert_eq!(classifier.classify("domain.user"), Layer::Other);
    }

    #[test]
    fn test_assign_is_total_and_deterministic() {
        let mut graph = ModuleDependencyGraph::new();
        graph.add_dependency("domain.order", "adapters.db");
        graph.add_module("adapters.db");
        graph.add_dependency("application.service", "domain.order");
        graph.add_dependency("main", "requests");

        let classifier = LayerClassifier::default();
        let first = classifier.assign(&graph);
        let second = classifier.assign(&graph);
        assert_eq!(first, second);
        assert_eq!(first.len(), graph.len());
        assert_eq!(first["domain.order"], Layer::Domain);
        assert_eq!(first["adapters.db"], Layer::Adapters);
        assert_eq!(first["application.service"], Layer::Application);
        assert_eq!(first["main"], Layer::Other);
        // External names are not keys, so they are not classified
        assert!(!first.contains_key("requests"));
        assert_eq!(layer_of(&first, "requests"), Layer::Other);
    }
}
