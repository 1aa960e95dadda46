use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::indexer::normalize_rel_path;
use crate::types::ImportRecord;

/// Directed module dependency graph of one component.
///
/// Keys are the component's own modules; every file becomes a key even when
/// it imports nothing. Dependencies are kept verbatim, so external library
/// names show up as leaves unless they coincide with a local module.
/// Serializes as `{module: [dependency, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleDependencyGraph {
    modules: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from per-file import records.
    ///
    /// Record paths are taken relative to `component_root` when they carry it
    /// as a prefix, and used as-is otherwise.
    pub fn build(records: &[ImportRecord], component_root: &Path) -> Self {
        let mut graph = Self::new();
        let root = normalize_rel_path(component_root);
        for record in records {
            let rel = if root.is_empty() {
                record.path.as_str()
            } else {
                record
                    .path
                    .strip_prefix(&root)
                    .and_then(|p| p.strip_prefix('/'))
                    .unwrap_or(&record.path)
            };
            let module = module_id(Path::new(rel));
            graph.add_module(&module);
            for import in &record.imports {
                graph.add_dependency(&module, import);
            }
        }
        graph
    }

    /// Add a module node. Existing dependencies are kept.
    pub fn add_module(&mut self, module: &str) {
        self.modules.entry(module.to_string()).or_default();
    }

    /// Add an edge, creating the source node if needed.
    pub fn add_dependency(&mut self, module: &str, dependency: &str) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(dependency.to_string());
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn dependencies(&self, module: &str) -> Option<&BTreeSet<String>> {
        self.modules.get(module)
    }

    /// Local modules (the graph's keys).
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.modules.iter().map(|(m, deps)| (m.as_str(), deps))
    }

    /// Every (module, dependency) pair, one per distinct edge.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.modules
            .iter()
            .flat_map(|(m, deps)| deps.iter().map(move |d| (m.as_str(), d.as_str())))
    }

    /// Keys and every dependency value, including unresolved external names.
    pub fn nodes(&self) -> BTreeSet<&str> {
        self.modules
            .iter()
            .flat_map(|(m, deps)| std::iter::once(m.as_str()).chain(deps.iter().map(String::as_str)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.modules.values().map(BTreeSet::len).sum()
    }

    /// Find cycles via strongly connected components. Returns groups of
    /// modules that import each other, each group sorted.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();
        for node in self.nodes() {
            index.insert(node, graph.add_node(node));
        }
        for (from, to) in self.edges() {
            graph.add_edge(index[from], index[to], ());
        }

        let mut cycles: Vec<Vec<String>> = petgraph::algo::kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.iter().map(|&idx| graph[idx].to_string()).collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// Derive a dotted module identifier from a path relative to a component
/// root: separators become `.` and the file extension is dropped.
pub fn module_id(rel_path: &Path) -> String {
    let normalized = normalize_rel_path(&rel_path.with_extension(""));
    normalized.replace('/', ".")
}
