use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::graph::ModuleDependencyGraph;
use crate::rules::RuleKind;
use crate::types::{LayerAssignment, ParseFailure};

/// A rule that failed for one component without affecting its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule: String,
    pub error: String,
}

/// Analysis results of one component.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentRecord {
    /// Component root relative to the project root.
    pub path: String,
    pub import_dependencies_graph: ModuleDependencyGraph,
    pub layers: LayerAssignment,
    /// Rule result key -> violation messages.
    pub architecture_notes: BTreeMap<String, Vec<String>>,
    /// Results of component and analyzer rules, keyed by result key.
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_failures: Vec<RuleFailure>,
}

impl ComponentRecord {
    pub fn new(path: impl Into<String>, graph: ModuleDependencyGraph, layers: LayerAssignment) -> Self {
        Self {
            path: path.into(),
            import_dependencies_graph: graph,
            layers,
            ..Default::default()
        }
    }

    pub fn violation_count(&self) -> usize {
        self.architecture_notes.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub name: String,
    pub kind: RuleKind,
    pub reason: String,
}

/// Which registered rules ran and which were skipped, and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub skipped: Vec<SkippedRule>,
}

impl DispatchSummary {
    pub fn dispatched(&self) -> usize {
        self.total - self.skipped.len()
    }
}

/// Everything one analysis run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub generated_at: DateTime<Utc>,
    pub project_files: Vec<String>,
    pub project_properties: BTreeMap<String, Value>,
    pub components: Vec<ComponentRecord>,
    pub parse_failures: Vec<ParseFailure>,
    pub dispatch: DispatchSummary,
}

impl ProjectReport {
    /// Total architecture violations across all components.
    pub fn violation_count(&self) -> usize {
        self.components.iter().map(ComponentRecord::violation_count).sum()
    }
}
