use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Name of the per-project configuration file.
pub const CONFIG_FILE: &str = ".archlens.toml";

/// Top-level configuration from `.archlens.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub layers: LayersConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory names pruned from every walk.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Glob patterns (relative to the walked root) for files to skip.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Component roots relative to the project root.
    #[serde(default)]
    pub components: Vec<String>,
    /// Glob used to discover component roots when `components` is empty.
    #[serde(default)]
    pub components_pattern: Option<String>,
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        ".hg",
        "__pycache__",
        ".venv",
        "venv",
        ".tox",
        ".mypy_cache",
        ".pytest_cache",
        "node_modules",
        ".archlens",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: default_exclude_dirs(),
            exclude_patterns: Vec::new(),
            components: Vec::new(),
            components_pattern: None,
        }
    }
}

/// Directory keywords mapping module paths to architectural layers.
/// Groups are tried in the order domain, application, adapters, config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayersConfig {
    #[serde(default = "default_domain_keywords")]
    pub domain: Vec<String>,
    #[serde(default = "default_application_keywords")]
    pub application: Vec<String>,
    #[serde(default = "default_adapters_keywords")]
    pub adapters: Vec<String>,
    #[serde(default = "default_config_keywords")]
    pub config: Vec<String>,
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

fn default_domain_keywords() -> Vec<String> {
    keywords(&["domain", "core", "model", "entities"])
}

fn default_application_keywords() -> Vec<String> {
    keywords(&["application", "service", "use_cases", "services"])
}

fn default_adapters_keywords() -> Vec<String> {
    keywords(&["adapters", "infrastructure", "interfaces", "ports"])
}

fn default_config_keywords() -> Vec<String> {
    keywords(&["config", "settings", "composites"])
}

impl Default for LayersConfig {
    fn default() -> Self {
        Self {
            domain: default_domain_keywords(),
            application: default_application_keywords(),
            adapters: default_adapters_keywords(),
            config: default_config_keywords(),
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Rule names (as registered, e.g. `is_monorepository`) to skip.
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Settings for the model-backed analyzer used by analyzer rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Characters of each file sent to the analyzer.
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "ARCHLENS_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_tokens() -> u32 {
    10_000
}

fn default_max_file_chars() -> usize {
    10_000
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            max_file_chars: default_max_file_chars(),
        }
    }
}

impl Config {
    /// Load configuration from a `.archlens.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `archlens init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `.archlens.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut current = start.as_path();
        loop {
            let config_path = current.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!(
                            config = %config_path.display(),
                            "failed to load config: {e:#}. Using defaults."
                        );
                        Self::default()
                    }
                };
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::default()
    }

    /// Generate default TOML content for `archlens init`.
    pub fn default_toml() -> String {
        r#"# archlens - architecture analysis configuration

[project]
# Directory names skipped while walking the project
exclude_dirs = [".git", ".hg", "__pycache__", ".venv", "venv", ".tox", ".mypy_cache", ".pytest_cache", "node_modules", ".archlens"]
# Glob patterns for files to skip, relative to the walked root
exclude_patterns = []
# Component roots relative to the project root. When empty, components are
# discovered with `components_pattern`, or the project root is analyzed as one component.
components = []
# components_pattern = "services/*"

[layers]
# Directory names that place a module in a layer. The first matching group
# wins, in the order domain, application, adapters, config.
domain = ["domain", "core", "model", "entities"]
application = ["application", "service", "use_cases", "services"]
adapters = ["adapters", "infrastructure", "interfaces", "ports"]
config = ["config", "settings", "composites"]

[rules]
# Rule names to skip, e.g. ["is_monorepository"]
disabled = []

[analyzer]
# Model-backed rules (check_data_layer) only run when enabled
enabled = false
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "ARCHLENS_API_KEY"
timeout_secs = 120
max_retries = 3
temperature = 0.0
max_tokens = 10000
max_file_chars = 10000
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.project.components.is_empty());
        assert!(config.project.exclude_dirs.contains(&".git".to_string()));
        assert_eq!(
            config.layers.domain,
            vec!["domain", "core", "model", "entities"]
        );
        assert!(!config.analyzer.enabled);
        assert_eq!(config.analyzer.timeout_secs, 120);
        assert_eq!(config.analyzer.max_retries, 3);
    }

    #[test]
    fn test_deserialize_config() {
        let toml_str = r#"
[project]
components = ["backend", "worker"]

[layers]
domain = ["kernel"]
adapters = ["gateways"]

[rules]
disabled = ["is_monorepository"]

[analyzer]
enabled = true
model = "local-model"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.components, vec!["backend", "worker"]);
        assert_eq!(config.layers.domain, vec!["kernel"]);
        assert_eq!(config.layers.adapters, vec!["gateways"]);
        // Omitted groups keep their defaults
        assert_eq!(config.layers.config, default_config_keywords());
        assert_eq!(config.rules.disabled, vec!["is_monorepository"]);
        assert!(config.analyzer.enabled);
        assert_eq!(config.analyzer.model, "local-model");
        assert_eq!(config.analyzer.max_file_chars, 10_000);
    }

    #[test]
    fn test_default_toml_is_valid() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.layers.domain, defaults.layers.domain);
        assert_eq!(config.layers.application, defaults.layers.application);
        assert_eq!(config.project.exclude_dirs, defaults.project.exclude_dirs);
        assert_eq!(config.analyzer.max_tokens, defaults.analyzer.max_tokens);
    }

    #[test]
    fn test_components_pattern_parses() {
        let toml_str = r#"
[project]
components_pattern = "services/*"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.project.components_pattern.as_deref(),
            Some("services/*")
        );
    }

    #[test]
    fn test_load_or_default_walks_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[rules]\ndisabled = [\"circular_dependencies\"]\n",
        )
        .unwrap();
        let nested = dir.path().join("src/app");
        std::fs::create_dir_all(&nested).unwrap();

        let config = Config::load_or_default(&nested);
        assert_eq!(config.rules.disabled, vec!["circular_dependencies"]);
    }

    #[test]
    fn test_load_or_default_falls_back_on_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[layers\nbroken").unwrap();

        let config = Config::load_or_default(dir.path());
        assert_eq!(config.layers.domain, default_domain_keywords());
    }
}
