//! Process-level cache of initialized engines, keyed by document identity.
//!
//! Repeated queries against the same document skip re-ingestion entirely.
//! The cache is an explicit object owned by the orchestration layer, passed
//! into request handling rather than held as ambient global state, with
//! an optional capacity bound and least-recently-used eviction.

use crate::engine::{ChunkParams, EngineDeps, IngestStats, RagEngine};
use crate::search::SearchHit;
use crate::store::{self, IndexStore};
use docchat_core::AppResult;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to a cached engine.
pub type EngineHandle = Arc<RwLock<RagEngine>>;

struct CacheInner {
    engines: HashMap<String, EngineHandle>,

    /// Keys ordered least- to most-recently used
    recency: Vec<String>,

    /// Per-key ingestion locks (single-flight)
    key_locks: HashMap<String, Arc<Mutex<()>>>,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        self.recency.retain(|k| k != key);
        self.recency.push(key.to_string());
    }

    fn insert(&mut self, key: String, engine: EngineHandle, capacity: Option<usize>) {
        self.engines.insert(key.clone(), engine);
        self.touch(&key);

        if let Some(capacity) = capacity {
            while self.engines.len() > capacity && !self.recency.is_empty() {
                let evicted = self.recency.remove(0);
                self.engines.remove(&evicted);
                self.key_locks.remove(&evicted);
                tracing::info!("Evicted engine for '{}' (capacity {})", evicted, capacity);
            }
        }
    }
}

/// Cache of per-document engines with single-flight ingestion.
pub struct EngineCache {
    deps: EngineDeps,
    store: IndexStore,
    params: ChunkParams,
    capacity: Option<usize>,
    inner: Mutex<CacheInner>,
}

impl EngineCache {
    /// Create a cache. `capacity: None` reproduces the unbounded behavior;
    /// `Some(n)` bounds it to `n` engines with LRU eviction.
    pub fn new(
        deps: EngineDeps,
        store: IndexStore,
        params: ChunkParams,
        capacity: Option<usize>,
    ) -> Self {
        Self {
            deps,
            store,
            params,
            capacity,
            inner: Mutex::new(CacheInner {
                engines: HashMap::new(),
                recency: Vec::new(),
                key_locks: HashMap::new(),
            }),
        }
    }

    /// Configured capacity bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of engines currently cached.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.engines.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether an engine is cached for the document key.
    pub async fn contains(&self, doc_key: &str) -> bool {
        self.inner.lock().await.engines.contains_key(doc_key)
    }

    /// Get the engine for a document, ingesting on first access.
    ///
    /// Ingestion of the same key is serialized through a per-key lock, so
    /// at most one pipeline runs per document; concurrent requests for
    /// different keys proceed independently. A failed ingestion is not
    /// cached; the next request redoes the full pipeline.
    pub async fn get_or_ingest(&self, doc_path: &Path) -> AppResult<EngineHandle> {
        let key = store::doc_key(doc_path);

        if let Some(engine) = self.lookup(&key).await {
            tracing::debug!("Using cached engine for '{}'", key);
            return Ok(engine);
        }

        let key_lock = {
            let mut inner = self.inner.lock().await;
            Arc::clone(
                inner
                    .key_locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _guard = key_lock.lock().await;

        // Another request may have finished ingesting while we waited
        if let Some(engine) = self.lookup(&key).await {
            return Ok(engine);
        }

        tracing::info!("Initializing engine for '{}'", key);
        let mut engine = RagEngine::new(doc_path, self.params, self.deps.clone(), self.store.clone());
        engine.ingest(false).await?;

        let handle: EngineHandle = Arc::new(RwLock::new(engine));
        let mut inner = self.inner.lock().await;
        inner.insert(key, Arc::clone(&handle), self.capacity);

        Ok(handle)
    }

    async fn lookup(&self, key: &str) -> Option<EngineHandle> {
        let mut inner = self.inner.lock().await;
        if let Some(engine) = inner.engines.get(key) {
            let engine = Arc::clone(engine);
            inner.touch(key);
            Some(engine)
        } else {
            None
        }
    }

    /// Force a full re-ingestion of the document, replacing any cached
    /// engine and persisted record.
    pub async fn reingest(&self, doc_path: &Path) -> AppResult<IngestStats> {
        let key = store::doc_key(doc_path);

        let key_lock = {
            let mut inner = self.inner.lock().await;
            Arc::clone(
                inner
                    .key_locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        let _guard = key_lock.lock().await;

        let mut engine = RagEngine::new(doc_path, self.params, self.deps.clone(), self.store.clone());
        let stats = engine.ingest(true).await?;

        let handle: EngineHandle = Arc::new(RwLock::new(engine));
        let mut inner = self.inner.lock().await;
        inner.insert(key, handle, self.capacity);

        Ok(stats)
    }

    /// Answer a question from a document through the cached engine.
    pub async fn answer(
        &self,
        doc_path: &Path,
        query: &str,
        top_k: usize,
        model: &str,
    ) -> AppResult<String> {
        let engine = self.get_or_ingest(doc_path).await?;
        let engine = engine.read().await;
        engine.answer(query, top_k, model).await
    }

    /// Search a document through the cached engine.
    pub async fn search(
        &self,
        doc_path: &Path,
        query: &str,
        top_k: usize,
    ) -> AppResult<Vec<SearchHit>> {
        let engine = self.get_or_ingest(doc_path).await?;
        let engine = engine.read().await;
        engine.search(query, top_k).await
    }

    /// Search a document, formatted as ranked snippets.
    pub async fn search_only(
        &self,
        doc_path: &Path,
        query: &str,
        top_k: usize,
    ) -> AppResult<String> {
        let engine = self.get_or_ingest(doc_path).await?;
        let engine = engine.read().await;
        engine.search_only(query, top_k).await
    }
}
