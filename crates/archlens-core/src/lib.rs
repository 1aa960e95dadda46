pub mod analyzer;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod layer;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod types;

pub use analyzer::{ImportExtractor, ParsedFile};
pub use cancel::CancellationToken;
pub use config::Config;
pub use engine::RuleEngine;
pub use error::{AnalysisError, UpstreamError};
pub use graph::ModuleDependencyGraph;
pub use indexer::SourceIndexer;
pub use layer::LayerClassifier;
pub use model::ModelClient;
pub use pipeline::{AnalysisPipeline, AnalyzeOptions};
pub use report::{ComponentRecord, DispatchSummary, ProjectReport};
pub use rules::{Rule, RuleRegistry};
pub use types::*;
