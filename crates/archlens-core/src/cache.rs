use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{ImportRecord, ParseStatus};

/// Cached extraction result for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedImports {
    pub hash: String,
    pub imports: Vec<String>,
    pub status: ParseStatus,
}

impl CachedImports {
    /// Entry for `record`, extracted from `content`.
    pub fn new(content: &str, record: &ImportRecord) -> Self {
        Self {
            hash: compute_hash(content),
            imports: record.imports.clone(),
            status: record.status.clone(),
        }
    }
}

/// Per-file import cache stored in `.archlens/cache.json`, keyed by path
/// relative to the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportCache {
    pub files: HashMap<String, CachedImports>,
}

fn cache_path(project_root: &Path) -> PathBuf {
    project_root.join(".archlens").join("cache.json")
}

impl ImportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache of the project at `project_root`. A missing cache is empty.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = cache_path(project_root);
        match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e).with_context(|| format!("failed to open {}", path.display())),
        }
    }

    pub fn save(&self, project_root: &Path) -> Result<()> {
        let path = cache_path(project_root);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let file =
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).context("failed to serialize import cache")?;
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Cached result for a file, if its content has not changed since.
    pub fn get(&self, rel_path: &str, content: &str) -> Option<&CachedImports> {
        self.files
            .get(rel_path)
            .filter(|cached| cached.hash == compute_hash(content))
    }

    pub fn insert(&mut self, rel_path: String, entry: CachedImports) {
        self.files.insert(rel_path, entry);
    }

    /// Keep only entries for `project_files`. Returns how many were dropped.
    pub fn retain_project_files(&mut self, project_files: &[String]) -> usize {
        let live: HashSet<&String> = project_files.iter().collect();
        let before = self.files.len();
        self.files.retain(|path, _| live.contains(path));
        before - self.files.len()
    }
}

/// SHA-256 of file content, hex encoded.
pub fn compute_hash(content: &str) -> String {
    hex_digest(Sha256::digest(content.as_bytes()).as_slice())
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash_deterministic() {
        assert_eq!(compute_hash("import os"), compute_hash("import os"));
        assert_ne!(compute_hash("import os"), compute_hash("import sys"));
    }

    #[test]
    fn test_get_misses_on_changed_content() {
        let mut cache = ImportCache::new();
        let content = "import adapters.db\n";
        let record = ImportRecord::parsed("svc/domain/order.py", vec!["adapters.db".to_string()]);
        cache.insert(record.path.clone(), CachedImports::new(content, &record));

        let hit = cache.get("svc/domain/order.py", "import adapters.db\n").unwrap();
        assert_eq!(hit.imports, vec!["adapters.db"]);
        assert!(cache.get("svc/domain/order.py", "import os\n").is_none());
        assert!(cache.get("svc/domain/other.py", "import adapters.db\n").is_none());
    }

    #[test]
    fn test_retain_project_files_drops_deleted_files() {
        let mut cache = ImportCache::new();
        for path in ["a.py", "b.py"] {
            let record = ImportRecord::parsed(path, Vec::new());
            cache.insert(path.to_string(), CachedImports::new("", &record));
        }

        assert_eq!(cache.retain_project_files(&["a.py".to_string()]), 1);
        assert!(cache.files.contains_key("a.py"));
        assert!(!cache.files.contains_key("b.py"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = ImportCache::new();
        let record = ImportRecord::unparseable("broken.py", "syntax error at 1:5");
        cache.insert(record.path.clone(), CachedImports::new("def (", &record));
        cache.save(dir.path()).unwrap();

        let loaded = ImportCache::load(dir.path()).unwrap();
        assert_eq!(loaded.files.len(), 1);
        assert!(matches!(
            loaded.files["broken.py"].status,
            ParseStatus::Unparseable { .. }
        ));
        assert!(ImportCache::load(&dir.path().join("missing")).unwrap().files.is_empty());
    }

    #[test]
    fn test_load_rejects_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".archlens")).unwrap();
        std::fs::write(dir.path().join(".archlens/cache.json"), "{not json").unwrap();
        assert!(ImportCache::load(dir.path()).is_err());
    }
}
