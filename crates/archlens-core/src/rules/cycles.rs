use serde_json::Value;

use super::{ComponentContext, ComponentRule};
use crate::graph::ModuleDependencyGraph;

/// Groups of modules that import each other, directly or transitively.
pub struct CircularDependencyRule;

impl ComponentRule for CircularDependencyRule {
    fn name(&self) -> &'static str {
        "circular_dependencies"
    }

    fn evaluate(&self, graph: &ModuleDependencyGraph, _ctx: &ComponentContext<'_>) -> Value {
        Value::from(graph.find_cycles())
    }
}
