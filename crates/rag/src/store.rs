//! Persisted index records, one JSON file per document.
//!
//! A record holds everything needed to serve a document without
//! re-embedding: the chunk texts, their vectors, and the model that produced
//! them. Records are written whole and replaced whole; a reader never
//! observes a partially updated file.

use docchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The persisted unit for one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRecord {
    /// Original source path of the document
    pub document_path: String,

    /// Ordered chunk texts
    pub chunks: Vec<String>,

    /// Ordered embedding vectors, 1:1 with chunks by position
    pub embeddings: Vec<Vec<f32>>,

    /// Embedding model identifier the vectors were produced with
    pub model: String,
}

/// Summary of a persisted record, for stats output.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub doc_key: String,
    pub document_path: String,
    pub chunk_count: usize,
    pub model: String,
    pub size_bytes: u64,
}

/// Derive a document's stable key from its source path: the base filename
/// without extension. Two documents with the same stem but different
/// directories collide, a documented limitation of the keying scheme, kept
/// for compatibility with existing record files.
pub fn doc_key(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Filesystem store of index records keyed by document identity.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory this store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record file for a document key.
    pub fn record_path(&self, doc_key: &str) -> PathBuf {
        self.dir.join(format!("{}_embeddings.json", doc_key))
    }

    /// Persist a record, replacing any previous record for the same key.
    ///
    /// The JSON is written to a temp file and renamed into place, so a
    /// concurrent reader sees either the old record or the new one, never a
    /// torn write.
    pub fn save(&self, doc_key: &str, record: &IndexRecord) -> AppResult<PathBuf> {
        if record.chunks.len() != record.embeddings.len() {
            return Err(AppError::Serialization(format!(
                "Refusing to persist inconsistent record for '{}': {} chunks, {} embeddings",
                doc_key,
                record.chunks.len(),
                record.embeddings.len()
            )));
        }

        fs::create_dir_all(&self.dir)?;

        let path = self.record_path(doc_key);
        let tmp_path = self.dir.join(format!(".{}_embeddings.json.tmp", doc_key));

        let json = serde_json::to_string(record)?;
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &path)?;

        tracing::info!(
            "Saved index record for '{}' ({} chunks) to {:?}",
            doc_key,
            record.chunks.len(),
            path
        );

        Ok(path)
    }

    /// Load the record for a document key.
    ///
    /// Returns `Ok(None)` when no record exists yet: the normal cache-miss
    /// path, not a failure. A present but unreadable record is an error.
    pub fn load(&self, doc_key: &str) -> AppResult<Option<IndexRecord>> {
        let path = self.record_path(doc_key);
        if !path.exists() {
            tracing::debug!("No cached index record for '{}'", doc_key);
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let record: IndexRecord = serde_json::from_str(&content).map_err(|e| {
            AppError::Serialization(format!(
                "Corrupt index record at {:?}: {}",
                path, e
            ))
        })?;

        if record.chunks.len() != record.embeddings.len() {
            return Err(AppError::Serialization(format!(
                "Inconsistent index record at {:?}: {} chunks, {} embeddings",
                path,
                record.chunks.len(),
                record.embeddings.len()
            )));
        }

        tracing::info!(
            "Loaded cached index record for '{}' ({} chunks)",
            doc_key,
            record.chunks.len()
        );

        Ok(Some(record))
    }

    /// Whether a record exists for the key.
    pub fn exists(&self, doc_key: &str) -> bool {
        self.record_path(doc_key).exists()
    }

    /// Delete the record for a key. Returns whether anything was removed.
    pub fn delete(&self, doc_key: &str) -> AppResult<bool> {
        let path = self.record_path(doc_key);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    /// Stats for one record, if present.
    pub fn stats(&self, doc_key: &str) -> AppResult<Option<IndexStats>> {
        let Some(record) = self.load(doc_key)? else {
            return Ok(None);
        };
        let size_bytes = fs::metadata(self.record_path(doc_key))
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(Some(IndexStats {
            doc_key: doc_key.to_string(),
            document_path: record.document_path,
            chunk_count: record.chunks.len(),
            model: record.model,
            size_bytes,
        }))
    }

    /// List the keys of all persisted records.
    pub fn list_keys(&self) -> AppResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(key) = name.strip_suffix("_embeddings.json") {
                if !key.starts_with('.') {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record() -> IndexRecord {
        IndexRecord {
            document_path: "docs/report.pdf".to_string(),
            chunks: vec!["first chunk".to_string(), "second chunk".to_string()],
            embeddings: vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]],
            model: "text-embedding-3-small".to_string(),
        }
    }

    #[test]
    fn test_doc_key_from_path() {
        assert_eq!(doc_key(Path::new("/tmp/docs/report.pdf")), "report");
        assert_eq!(doc_key(Path::new("notes.md")), "notes");
        assert_eq!(doc_key(Path::new("archive.tar.gz")), "archive.tar");
    }

    #[test]
    fn test_doc_key_collision_ignores_directory() {
        // Same stem, different directories → same key. Documented
        // limitation of the keying scheme.
        assert_eq!(
            doc_key(Path::new("/a/report.pdf")),
            doc_key(Path::new("/b/report.pdf"))
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path().join("embeddings"));

        let record = sample_record();
        store.save("report", &record).unwrap();

        let loaded = store.load("report").unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_load_absent_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());
        assert!(store.load("nothing").unwrap().is_none());
        assert!(!store.exists("nothing"));
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());

        store.save("report", &sample_record()).unwrap();

        // A forced re-ingestion with a different chunking produces a
        // different chunk count; the old record must be fully replaced.
        let replacement = IndexRecord {
            document_path: "docs/report.pdf".to_string(),
            chunks: vec!["only chunk".to_string()],
            embeddings: vec![vec![1.0, 0.0, 0.0]],
            model: "text-embedding-3-small".to_string(),
        };
        store.save("report", &replacement).unwrap();

        let loaded = store.load("report").unwrap().unwrap();
        assert_eq!(loaded.chunks.len(), 1);
        assert_eq!(loaded, replacement);
    }

    #[test]
    fn test_save_rejects_mismatched_lengths() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());

        let mut record = sample_record();
        record.embeddings.pop();

        let result = store.save("report", &record);
        assert!(result.is_err());
        assert!(!store.exists("report"));
    }

    #[test]
    fn test_load_rejects_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(store.record_path("bad"), "not json").unwrap();

        assert!(store.load("bad").is_err());
    }

    #[test]
    fn test_save_creates_directory_idempotently() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path().join("nested").join("embeddings"));

        store.save("a", &sample_record()).unwrap();
        store.save("b", &sample_record()).unwrap();

        assert!(store.exists("a"));
        assert!(store.exists("b"));
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());

        store.save("report", &sample_record()).unwrap();
        assert!(store.delete("report").unwrap());
        assert!(!store.exists("report"));
        assert!(!store.delete("report").unwrap());
    }

    #[test]
    fn test_stats_and_list_keys() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path());

        store.save("beta", &sample_record()).unwrap();
        store.save("alpha", &sample_record()).unwrap();

        let stats = store.stats("alpha").unwrap().unwrap();
        assert_eq!(stats.chunk_count, 2);
        assert_eq!(stats.model, "text-embedding-3-small");
        assert!(stats.size_bytes > 0);

        assert!(store.stats("missing").unwrap().is_none());
        assert_eq!(store.list_keys().unwrap(), vec!["alpha", "beta"]);
    }
}
