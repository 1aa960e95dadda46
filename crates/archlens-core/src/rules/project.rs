//! Project-level rules evaluated over the whole file list.

use serde_json::Value;

use super::ProjectRule;

/// A yes/no property of the project's file list.
pub struct FileListRule {
    name: &'static str,
    check: fn(&[String]) -> bool,
}

impl FileListRule {
    pub fn new(name: &'static str, check: fn(&[String]) -> bool) -> Self {
        Self { name, check }
    }
}

impl ProjectRule for FileListRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn evaluate(&self, files: &[String]) -> Value {
        Value::Bool((self.check)(files))
    }
}

/// The built-in project rules.
pub fn builtin() -> Vec<FileListRule> {
    vec![
        FileListRule::new("is_monorepository", is_monorepository),
        FileListRule::new("is_have_gitignore_file", |f| has_file_named(f, ".gitignore")),
        FileListRule::new("is_have_editorconfig_file", |f| {
            has_file_named(f, ".editorconfig")
        }),
        FileListRule::new("is_have_gitattributes_file", |f| {
            has_file_named(f, ".gitattributes")
        }),
        FileListRule::new("is_have_deployment_files", has_deployment_files),
        FileListRule::new("is_have_docs_directory", |f| docs_files(f).next().is_some()),
        FileListRule::new("is_have_plantuml_diagrams", has_plantuml_diagrams),
        FileListRule::new("is_have_source_code_directory", has_source_code_directory),
        FileListRule::new("is_have_formatter_configs", has_formatter_configs),
    ]
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn has_file_named(files: &[String], name: &str) -> bool {
    files.iter().any(|p| file_name(p) == name)
}

/// More than one project file besides repository bookkeeping.
fn is_monorepository(files: &[String]) -> bool {
    const BOOKKEEPING: &[&str] = &[".git", ".gitignore", "README.md"];
    files
        .iter()
        .filter(|p| !BOOKKEEPING.contains(&file_name(p)))
        .count()
        > 1
}

fn has_deployment_files(files: &[String]) -> bool {
    files.iter().any(|p| p.split('/').any(|s| s == "deployment"))
}

fn docs_files(files: &[String]) -> impl Iterator<Item = &String> {
    files.iter().filter(|p| p.contains("docs/"))
}

fn has_plantuml_diagrams(files: &[String]) -> bool {
    docs_files(files).any(|p| p.ends_with(".puml") || p.ends_with(".plantuml"))
}

/// Source lives under a conventionally named directory.
fn has_source_code_directory(files: &[String]) -> bool {
    const SOURCE_DIRS: &[&str] = &["src/", "app/", "backend/"];
    files
        .iter()
        .any(|p| SOURCE_DIRS.iter().any(|dir| p.contains(dir)))
}

/// yapf/isort style configuration is present.
fn has_formatter_configs(files: &[String]) -> bool {
    const CONFIGS: &[&str] = &[".style.yapf", "setup.cfg", "pyproject.toml", "tox.ini"];
    files
        .iter()
        .any(|p| CONFIGS.iter().any(|cfg| p.contains(cfg)))
}
