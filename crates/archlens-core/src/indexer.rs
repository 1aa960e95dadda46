use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ProjectConfig;
use crate::error::AnalysisError;
use crate::types::SourceFile;

/// Enumerates the files of a project or component.
///
/// Results are sorted so reports are stable between runs; callers must not
/// depend on that order for correctness.
pub struct SourceIndexer {
    exclude_dirs: HashSet<String>,
    exclude: GlobSet,
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, "ignoring invalid exclude pattern: {e}"),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

impl SourceIndexer {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            exclude_dirs: config.exclude_dirs.iter().cloned().collect(),
            exclude: build_globset(&config.exclude_patterns),
        }
    }

    /// Every regular file under `root`, relative to it and `/`-separated.
    pub fn project_files(&self, root: &Path) -> Vec<String> {
        self.walk(root, |_| true)
            .iter()
            .map(|p| normalize_rel_path(p))
            .collect()
    }

    /// Files under `root` whose extension is one of `extensions`, relative to `root`.
    pub fn source_files(&self, root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
        self.walk(root, |path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
    }

    /// Read one file as text. `rel_path` is relative to `root`.
    pub fn read(&self, root: &Path, rel_path: &Path) -> Result<SourceFile, AnalysisError> {
        let full = root.join(rel_path);
        let bytes = std::fs::read(&full).map_err(|source| AnalysisError::Io {
            path: full.clone(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|e| AnalysisError::Parse {
            path: rel_path.to_path_buf(),
            diagnostic: format!("file is not valid UTF-8: {e}"),
        })?;
        Ok(SourceFile {
            path: rel_path.to_path_buf(),
            content,
        })
    }

    fn walk(&self, root: &Path, keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !self.is_excluded_dir(e))
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!(root = %root.display(), "skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(root).ok()?.to_path_buf();
                if self.exclude.is_match(&rel) || !keep(&rel) {
                    return None;
                }
                Some(rel)
            })
            .collect();
        files.sort();
        debug!(root = %root.display(), count = files.len(), "indexed files");
        files
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.exclude_dirs.contains(name))
    }
}

/// Render a relative path with `/` separators regardless of platform.
pub fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_project_files_are_relative_and_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "README.md", "# demo");
        touch(tmp.path(), "src/app/main.py", "import os");
        touch(tmp.path(), ".gitignore", "*.pyc");

        let indexer = SourceIndexer::new(&ProjectConfig::default());
        let files = indexer.project_files(tmp.path());
        assert_eq!(files, vec![".gitignore", "README.md", "src/app/main.py"]);
    }

    #[test]
    fn test_excluded_dirs_are_pruned() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "app.py", "");
        touch(tmp.path(), ".git/config", "");
        touch(tmp.path(), "pkg/__pycache__/app.cpython-311.pyc", "");

        let indexer = SourceIndexer::new(&ProjectConfig::default());
        assert_eq!(indexer.project_files(tmp.path()), vec!["app.py"]);
    }

    #[test]
    fn test_exclude_patterns_skip_files() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "app/models.py", "");
        touch(tmp.path(), "app/migrations/0001_initial.py", "");

        let config = ProjectConfig {
            exclude_patterns: vec!["**/migrations/**".to_string()],
            ..ProjectConfig::default()
        };
        let indexer = SourceIndexer::new(&config);
        let files = indexer.source_files(tmp.path(), &["py"]);
        assert_eq!(files, vec![PathBuf::from("app/models.py")]);
    }

    #[test]
    fn test_source_files_filter_by_extension() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "domain/order.py", "");
        touch(tmp.path(), "domain/order.md", "");
        touch(tmp.path(), "setup.cfg", "");

        let indexer = SourceIndexer::new(&ProjectConfig::default());
        let files = indexer.source_files(tmp.path(), &["py"]);
        assert_eq!(files, vec![PathBuf::from("domain/order.py")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "a/first.py", "");
        touch(tmp.path(), "locked/hidden.py", "");
        touch(tmp.path(), "z/last.py", "");
        let locked = tmp.path().join("locked");
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
        let enforced = std::fs::read_dir(&locked).is_err();

        let indexer = SourceIndexer::new(&ProjectConfig::default());
        let files = indexer.project_files(tmp.path());
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(files.contains(&"a/first.py".to_string()), "{files:?}");
        assert!(files.contains(&"z/last.py".to_string()), "{files:?}");
        if enforced {
            assert_eq!(files, vec!["a/first.py", "z/last.py"]);
        }
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let indexer = SourceIndexer::new(&ProjectConfig::default());
        assert!(indexer.project_files(&tmp.path().join("absent")).is_empty());
    }

    #[test]
    fn test_read_rejects_invalid_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.py"), [0xff, 0xfe, 0x00]).unwrap();

        let indexer = SourceIndexer::new(&ProjectConfig::default());
        let err = indexer
            .read(tmp.path(), Path::new("bad.py"))
            .expect_err("invalid UTF-8 should fail");
        assert!(matches!(err, AnalysisError::Parse { .. }));
    }

    #[test]
    fn test_normalize_rel_path() {
        assert_eq!(
            normalize_rel_path(Path::new("./domain/order.py")),
            "domain/order.py"
        );
    }
}
