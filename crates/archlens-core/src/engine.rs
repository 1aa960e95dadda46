use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RulesConfig;
use crate::error::AnalysisError;
use crate::graph::ModuleDependencyGraph;
use crate::model::ModelClient;
use crate::report::{ComponentRecord, DispatchSummary, RuleFailure, SkippedRule};
use crate::rules::{ComponentContext, Rule, RuleRegistry};

/// Dispatches registered rules and stores their results under their keys.
pub struct RuleEngine {
    registry: RuleRegistry,
    disabled: HashSet<String>,
    analyzer: Option<Arc<dyn ModelClient>>,
}

impl RuleEngine {
    pub fn new(registry: RuleRegistry, config: &RulesConfig) -> Self {
        let disabled: HashSet<String> = config.disabled.iter().cloned().collect();
        for name in &disabled {
            if registry.get(name).is_none() {
                warn!(rule = %name, "disabled rule is not registered");
            }
        }
        Self {
            registry,
            disabled,
            analyzer: None,
        }
    }

    /// Hand the engine an analyzer for `AnalyzerRule`s. The caller keeps
    /// ownership of its lifecycle.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn ModelClient>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    fn skip_reason(&self, rule: &Rule) -> Option<&'static str> {
        if self.disabled.contains(rule.name()) {
            Some("disabled in configuration")
        } else if matches!(rule, Rule::Analyzer(_)) && self.analyzer.is_none() {
            Some("no analyzer configured")
        } else {
            None
        }
    }

    /// Registered rules and the ones this engine will not run.
    pub fn dispatch_summary(&self) -> DispatchSummary {
        let skipped: Vec<SkippedRule> = self
            .registry
            .rules()
            .iter()
            .filter_map(|rule| {
                self.skip_reason(rule).map(|reason| SkippedRule {
                    name: rule.name().to_string(),
                    kind: rule.kind(),
                    reason: reason.to_string(),
                })
            })
            .collect();
        for s in &skipped {
            let err = AnalysisError::RuleDispatch {
                rule: s.name.clone(),
                reason: s.reason.clone(),
            };
            warn!(kind = %s.kind, "{err}");
        }
        DispatchSummary {
            total: self.registry.len(),
            skipped,
        }
    }

    /// Run every project rule against the full project file list.
    pub fn apply_project_rules(&self, files: &[String]) -> BTreeMap<String, Value> {
        let mut properties = BTreeMap::new();
        for rule in self.registry.rules() {
            let Rule::Project(r) = rule else { continue };
            if self.skip_reason(rule).is_some() {
                continue;
            }
            debug!(rule = r.name(), "evaluating project rule");
            properties.insert(rule.result_key().to_string(), r.evaluate(files));
        }
        properties
    }

    /// Run every component, architecture and analyzer rule for one component.
    /// A failing analyzer rule is recorded in `record.rule_failures` and the
    /// remaining rules still run.
    pub fn apply_component_rules(
        &self,
        record: &mut ComponentRecord,
        graph: &ModuleDependencyGraph,
        ctx: &ComponentContext<'_>,
    ) {
        for rule in self.registry.rules() {
            if self.skip_reason(rule).is_some() {
                continue;
            }
            let key = rule.result_key().to_string();
            match rule {
                Rule::Project(_) => {}
                Rule::Component(r) => {
                    record.properties.insert(key, r.evaluate(graph, ctx));
                }
                Rule::Architecture(r) => {
                    let notes = r
                        .check(graph, ctx)
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    record.architecture_notes.insert(key, notes);
                }
                Rule::Analyzer(r) => {
                    let Some(analyzer) = self.analyzer.as_deref() else {
                        continue;
                    };
                    match r.analyze(graph, ctx.absolute_root, analyzer) {
                        Ok(value) => {
                            record.properties.insert(key, value);
                        }
                        Err(e) => {
                            let err = AnalysisError::from(e);
                            warn!(rule = r.name(), component = %record.path, "{err}");
                            record.rule_failures.push(RuleFailure {
                                rule: r.name().to_string(),
                                error: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}
