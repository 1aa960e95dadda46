use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

use archlens_core::graph::ModuleDependencyGraph;
use archlens_core::layer::layer_of;
use archlens_core::rules::hexagonal::is_hexagonal_candidate;
use archlens_core::types::{Layer, LayerAssignment};

/// Output format of a rendered dependency diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Png,
    Svg,
    /// The DOT source itself; Graphviz is not needed.
    Dot,
}

impl RenderFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            RenderFormat::Png => "png",
            RenderFormat::Svg => "svg",
            RenderFormat::Dot => "dot",
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to run Graphviz `dot` (is Graphviz installed?): {0}")]
    GraphvizUnavailable(#[source] std::io::Error),
    #[error("Graphviz `dot` exited with {status}: {stderr}")]
    Graphviz { status: String, stderr: String },
    #[error("failed to talk to Graphviz `dot`: {0}")]
    Io(#[from] std::io::Error),
}

/// Generate a left-to-right GraphViz DOT diagram of a module graph.
///
/// Contains every local module and every imported name, and one edge per
/// distinct (module, dependency) pair. With a layer assignment, nodes are
/// tinted by layer. In components with domain, application and adapters
/// modules, edges out of the domain core are marked red.
pub fn generate_dot(graph: &ModuleDependencyGraph, layers: Option<&LayerAssignment>) -> String {
    let mut out = String::new();
    out.push_str("digraph dependencies {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=\"rounded,filled\", fillcolor=\"#f5f5f5\"];\n\n");

    for node in graph.nodes() {
        let id = quote_dot_id(node);
        match layers {
            Some(assignment) if graph.contains_module(node) => {
                let color = layer_color(layer_of(assignment, node));
                out.push_str(&format!("  {id} [fillcolor=\"{color}\"];\n"));
            }
            Some(_) => out.push_str(&format!("  {id} [style=\"rounded,dashed\"];\n")),
            None => out.push_str(&format!("  {id};\n")),
        }
    }
    out.push('\n');

    let hexagonal = layers.filter(|assignment| is_hexagonal_candidate(assignment));
    for (module, dependency) in graph.edges() {
        let from = quote_dot_id(module);
        let to = quote_dot_id(dependency);
        let is_violation = hexagonal.is_some_and(|assignment| {
            layer_of(assignment, module).violates_dependency_on(&layer_of(assignment, dependency))
        });
        if is_violation {
            out.push_str(&format!("  {from} -> {to} [color=red, style=dashed];\n"));
        } else {
            out.push_str(&format!("  {from} -> {to};\n"));
        }
    }

    out.push_str("}\n");
    out
}

/// Render a module graph. PNG and SVG pipe the DOT source through the
/// Graphviz `dot` executable.
pub fn render(
    graph: &ModuleDependencyGraph,
    layers: Option<&LayerAssignment>,
    format: RenderFormat,
) -> Result<Vec<u8>, RenderError> {
    let source = generate_dot(graph, layers);
    if format == RenderFormat::Dot {
        return Ok(source.into_bytes());
    }
    rasterize(&source, format)
}

fn rasterize(source: &str, format: RenderFormat) -> Result<Vec<u8>, RenderError> {
    debug!(format = format.extension(), "running graphviz");
    let mut child = Command::new("dot")
        .arg(format!("-T{}", format.extension()))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RenderError::GraphvizUnavailable)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(source.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(RenderError::Graphviz {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

fn layer_color(layer: Layer) -> &'static str {
    match layer {
        Layer::Domain => "#e8f5e9",
        Layer::Application => "#e3f2fd",
        Layer::Adapters => "#fff3e0",
        Layer::Config => "#f3e5f5",
        Layer::Other => "#ffffff",
    }
}

/// Quote a module name as a DOT ID. Quoting keeps distinct names distinct.
fn quote_dot_id(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
