//! Rule interfaces and the registry the rule engine dispatches from.
//!
//! Every rule declares its dispatch shape by the interface it implements and
//! the `Rule` variant it is registered under. The engine never inspects
//! names or signatures to decide how to call a rule.

pub mod cycles;
pub mod data_layer;
pub mod hexagonal;
pub mod imports;
pub mod project;

use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::AnalyzerConfig;
use crate::error::UpstreamError;
use crate::graph::ModuleDependencyGraph;
use crate::layer::LayerClassifier;
use crate::model::ModelClient;
use crate::types::ArchitectureViolation;

/// Inputs available to per-component rules besides the graph itself.
pub struct ComponentContext<'a> {
    /// Component root relative to the project root.
    pub root: &'a Path,
    /// Component root on disk.
    pub absolute_root: &'a Path,
    /// Every file of the project, relative to the project root.
    pub project_files: &'a [String],
    pub classifier: &'a LayerClassifier,
}

/// Rule evaluated once per run against the whole project file list.
pub trait ProjectRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, files: &[String]) -> Value;
}

/// Rule evaluated against one component's import graph.
/// Rules that only need the graph ignore `ctx`.
pub trait ComponentRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, graph: &ModuleDependencyGraph, ctx: &ComponentContext<'_>) -> Value;
}

/// Rule producing architecture violations, stored as component notes.
pub trait ArchitectureRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(
        &self,
        graph: &ModuleDependencyGraph,
        ctx: &ComponentContext<'_>,
    ) -> Vec<ArchitectureViolation>;
}

/// Rule that delegates part of its work to the model-backed analyzer.
pub trait AnalyzerRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn analyze(
        &self,
        graph: &ModuleDependencyGraph,
        component_root: &Path,
        analyzer: &dyn ModelClient,
    ) -> Result<Value, UpstreamError>;
}

/// A registered rule, tagged with its dispatch shape.
pub enum Rule {
    Project(Box<dyn ProjectRule>),
    Component(Box<dyn ComponentRule>),
    Architecture(Box<dyn ArchitectureRule>),
    Analyzer(Box<dyn AnalyzerRule>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Project,
    Component,
    Architecture,
    Analyzer,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Project => write!(f, "project"),
            RuleKind::Component => write!(f, "component"),
            RuleKind::Architecture => write!(f, "architecture"),
            RuleKind::Analyzer => write!(f, "analyzer"),
        }
    }
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Project(r) => r.name(),
            Rule::Component(r) => r.name(),
            Rule::Architecture(r) => r.name(),
            Rule::Analyzer(r) => r.name(),
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::Project(_) => RuleKind::Project,
            Rule::Component(_) => RuleKind::Component,
            Rule::Architecture(_) => RuleKind::Architecture,
            Rule::Analyzer(_) => RuleKind::Analyzer,
        }
    }

    /// Key the rule's result is stored under.
    pub fn result_key(&self) -> &'static str {
        result_key(self.name())
    }
}

/// Strip a leading `is_` from a rule name: `is_have_gitignore_file` -> `have_gitignore_file`.
pub fn result_key(name: &str) -> &str {
    name.strip_prefix("is_").unwrap_or(name)
}

/// Explicit, startup-time list of rules.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule.
    pub fn builtin(analyzer: &AnalyzerConfig) -> Self {
        let mut registry = Self::new();
        for rule in project::builtin() {
            registry.register(Rule::Project(Box::new(rule)));
        }
        registry
            .register(Rule::Component(Box::new(imports::JwtAuthorizationRule)))
            .register(Rule::Component(Box::new(imports::SwaggerEndpointRule)))
            .register(Rule::Component(Box::new(cycles::CircularDependencyRule)))
            .register(Rule::Architecture(Box::new(
                hexagonal::HexagonalArchitectureRule,
            )))
            .register(Rule::Analyzer(Box::new(data_layer::DataLayerRule::new(
                analyzer.max_file_chars,
            ))));
        registry
    }

    /// Register a rule. A rule with the same name replaces the earlier one.
    pub fn register(&mut self, rule: Rule) -> &mut Self {
        if let Some(pos) = self.rules.iter().position(|r| r.name() == rule.name()) {
            warn!(rule = rule.name(), "replacing previously registered rule");
            self.rules[pos] = rule;
        } else {
            self.rules.push(rule);
        }
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(&'static str);

    impl ProjectRule for Constant {
        fn name(&self) -> &'static str {
            self.0
        }

        fn evaluate(&self, _files: &[String]) -> Value {
            Value::Bool(true)
        }
    }

    #[test]
    fn test_result_key_strips_leading_is() {
        assert_eq!(result_key("is_have_gitignore_file"), "have_gitignore_file");
        assert_eq!(result_key("is_monorepository"), "monorepository");
        assert_eq!(
            result_key("hexagonal_architecture_comments"),
            "hexagonal_architecture_comments"
        );
        // Only the leading prefix is stripped
        assert_eq!(result_key("this_is_fine"), "this_is_fine");
    }

    #[test]
    fn test_builtin_registry_has_every_shape() {
        let registry = RuleRegistry::builtin(&AnalyzerConfig::default());
        let kinds: Vec<RuleKind> = registry.rules().iter().map(Rule::kind).collect();
        assert!(kinds.contains(&RuleKind::Project));
        assert!(kinds.contains(&RuleKind::Component));
        assert!(kinds.contains(&RuleKind::Architecture));
        assert!(kinds.contains(&RuleKind::Analyzer));
        assert!(registry.get("hexagonal_architecture_comments").is_some());
        assert!(registry.get("check_data_layer").is_some());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = RuleRegistry::new();
        registry
            .register(Rule::Project(Box::new(Constant("is_custom"))))
            .register(Rule::Project(Box::new(Constant("is_custom"))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.rules()[0].result_key(), "custom");
    }
}
