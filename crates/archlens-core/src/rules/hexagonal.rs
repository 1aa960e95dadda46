//! Hexagonal-architecture violation detection.

use tracing::debug;

use super::{ArchitectureRule, ComponentContext};
use crate::graph::ModuleDependencyGraph;
use crate::layer::layer_of;
use crate::types::{ArchitectureViolation, Layer, LayerAssignment};

/// Flags domain modules that depend on application, adapter, or config modules.
///
/// The check only applies to components that look like they attempt a
/// hexagonal layout, i.e. have at least one domain, one application and one
/// adapters module. For any other component it returns no violations, which
/// means "not applicable" rather than "passed".
pub struct HexagonalArchitectureRule;

impl ArchitectureRule for HexagonalArchitectureRule {
    fn name(&self) -> &'static str {
        "hexagonal_architecture_comments"
    }

    fn check(
        &self,
        graph: &ModuleDependencyGraph,
        ctx: &ComponentContext<'_>,
    ) -> Vec<ArchitectureViolation> {
        let assignment = ctx.classifier.assign(graph);
        if !is_hexagonal_candidate(&assignment) {
            debug!(
                component = %ctx.root.display(),
                "component lacks domain/application/adapters layers; hexagonal check not applicable"
            );
            return Vec::new();
        }
        find_violations(graph, &assignment)
    }
}

/// At least one module in each of the domain, application and adapters layers.
pub fn is_hexagonal_candidate(assignment: &LayerAssignment) -> bool {
    [Layer::Domain, Layer::Application, Layer::Adapters]
        .iter()
        .all(|layer| assignment.values().any(|l| l == layer))
}

/// One violation per edge from a domain module into an outward-facing layer.
/// Targets that are not local modules count as `other`.
pub fn find_violations(
    graph: &ModuleDependencyGraph,
    assignment: &LayerAssignment,
) -> Vec<ArchitectureViolation> {
    graph
        .edges()
        .filter_map(|(module, dependency)| {
            let module_layer = layer_of(assignment, module);
            let dependency_layer = layer_of(assignment, dependency);
            module_layer
                .violates_dependency_on(&dependency_layer)
                .then(|| ArchitectureViolation {
                    module: module.to_string(),
                    module_layer,
                    dependency: dependency.to_string(),
                    dependency_layer,
                })
        })
        .collect()
}
