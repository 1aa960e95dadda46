//! Component rules that look for specific libraries in the import graph.

use serde_json::Value;

use super::{ComponentContext, ComponentRule};
use crate::graph::ModuleDependencyGraph;

const JWT_IMPORTS: &[&str] = &["jwt", "PyJWT"];

const SWAGGER_FILES: &[&str] = &["swagger.yaml", "swagger.json"];

const SWAGGER_IMPORTS: &[&str] = &[
    "flask_swagger",
    "drf_yasg",
    "swagger_ui",
    "fastapi",
    "fastapi.openapi",
    "fastapi.openapi.utils",
];

fn imports_any(graph: &ModuleDependencyGraph, names: &[&str]) -> bool {
    graph
        .iter()
        .any(|(_, deps)| names.iter().any(|name| deps.contains(*name)))
}

/// Whether any module imports a JWT library.
pub struct JwtAuthorizationRule;

impl ComponentRule for JwtAuthorizationRule {
    fn name(&self) -> &'static str {
        "is_have_jwt_authorization"
    }

    fn evaluate(&self, graph: &ModuleDependencyGraph, _ctx: &ComponentContext<'_>) -> Value {
        Value::Bool(imports_any(graph, JWT_IMPORTS))
    }
}

/// Whether the project ships a Swagger document or the component imports
/// an OpenAPI/Swagger integration.
pub struct SwaggerEndpointRule;

impl ComponentRule for SwaggerEndpointRule {
    fn name(&self) -> &'static str {
        "is_have_swagger_endpoint"
    }

    fn evaluate(&self, graph: &ModuleDependencyGraph, ctx: &ComponentContext<'_>) -> Value {
        let has_document = ctx
            .project_files
            .iter()
            .any(|f| SWAGGER_FILES.contains(&f.as_str()));
        Value::Bool(has_document || imports_any(graph, SWAGGER_IMPORTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerClassifier;
    use std::path::Path;

    fn check(rule: &dyn ComponentRule, graph: &ModuleDependencyGraph, files: &[String]) -> Value {
        let classifier = LayerClassifier::default();
        let ctx = ComponentContext {
            root: Path::new("."),
            absolute_root: Path::new("/tmp/project"),
            project_files: files,
            classifier: &classifier,
        };
        rule.evaluate(graph, &ctx)
    }

    #[test]
    fn test_jwt_detected_from_imports() {
        let mut graph = ModuleDependencyGraph::new();
        graph.add_dependency("auth.tokens", "jwt");
        assert_eq!(check(&JwtAuthorizationRule, &graph, &[]), Value::Bool(true));

        let mut plain = ModuleDependencyGraph::new();
        plain.add_dependency("auth.tokens", "hashlib");
        assert_eq!(check(&JwtAuthorizationRule, &plain, &[]), Value::Bool(false));
    }

    #[test]
    fn test_swagger_from_document_or_imports() {
        let mut graph = ModuleDependencyGraph::new();
        graph.add_module("main");
        let files = vec!["swagger.yaml".to_string()];
        assert_eq!(check(&SwaggerEndpointRule, &graph, &files), Value::Bool(true));
        assert_eq!(check(&SwaggerEndpointRule, &graph, &[]), Value::Bool(false));

        graph.add_dependency("api.app", "fastapi");
        assert_eq!(check(&SwaggerEndpointRule, &graph, &[]), Value::Bool(true));
    }
}
