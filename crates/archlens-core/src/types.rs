use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Architectural layer in a hexagonal layout, assigned from directory names.
/// Classification is a best-effort heuristic, not a statement about the
/// project's actual design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Domain,
    Application,
    Adapters,
    Config,
    Other,
}

impl Layer {
    /// Every layer tag, in classification order.
    pub const ALL: [Layer; 5] = [
        Layer::Domain,
        Layer::Application,
        Layer::Adapters,
        Layer::Config,
        Layer::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Domain => "domain",
            Layer::Application => "application",
            Layer::Adapters => "adapters",
            Layer::Config => "config",
            Layer::Other => "other",
        }
    }

    /// Returns true if a module in `self` depending on a module in `other`
    /// points outward from the domain core.
    pub fn violates_dependency_on(&self, other: &Layer) -> bool {
        matches!(self, Layer::Domain)
            && matches!(other, Layer::Application | Layer::Adapters | Layer::Config)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Layer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "domain" => Ok(Layer::Domain),
            "application" => Ok(Layer::Application),
            "adapters" => Ok(Layer::Adapters),
            "config" => Ok(Layer::Config),
            "other" => Ok(Layer::Other),
            _ => Err(anyhow::anyhow!("unknown layer: {s}")),
        }
    }
}

/// Module identifier -> layer tag.
pub type LayerAssignment = BTreeMap<String, Layer>;

/// A source file read from disk. `path` is relative to the component root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

/// Whether a file's syntax tree could be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ParseStatus {
    Parsed,
    Unparseable { diagnostic: String },
}

/// Imports declared by one file. Duplicate names are kept; they collapse
/// only when the record is folded into a module graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Path relative to the component root, `/`-separated.
    pub path: String,
    pub imports: Vec<String>,
    pub status: ParseStatus,
}

impl ImportRecord {
    pub fn parsed(path: impl Into<String>, imports: Vec<String>) -> Self {
        Self {
            path: path.into(),
            imports,
            status: ParseStatus::Parsed,
        }
    }

    pub fn unparseable(path: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            imports: Vec::new(),
            status: ParseStatus::Unparseable {
                diagnostic: diagnostic.into(),
            },
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self.status, ParseStatus::Parsed)
    }
}

/// A domain module depending on a module in an outward-facing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureViolation {
    pub module: String,
    pub module_layer: Layer,
    pub dependency: String,
    pub dependency_layer: Layer,
}

impl fmt::Display for ArchitectureViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hexagonal Architecture Violation: {} module '{}' depends on '{}' from layer '{}'",
            self.module_layer, self.module, self.dependency, self.dependency_layer
        )
    }
}

/// A file that contributed no imports because it could not be read or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub component: String,
    pub path: String,
    pub diagnostic: String,
}
