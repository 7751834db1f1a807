//! End-to-end tests for the ingest → search → answer flow.

use crate::cache::EngineCache;
use crate::document::StaticSource;
use crate::embeddings::{EmbeddingProvider, MockEmbedder};
use crate::engine::{ChunkParams, EngineDeps, RagEngine};
use crate::store::IndexStore;
use docchat_llm::{LlmClient, MockClient};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIMENSIONS: usize = 256;

/// A document with three topically distinct sections, sized so each lands
/// in its own chunk.
fn topical_document() -> String {
    let rust = "Rust is a systems programming language focused on safety and speed. ";
    let pasta = "Cooking pasta requires salted boiling water and fresh ingredients. ";
    let tennis = "Tennis tournaments are played on clay, grass, and hard courts. ";
    format!(
        "{}{}{}",
        rust.repeat(3),
        pasta.repeat(3),
        tennis.repeat(3)
    )
}

fn deps_for(text: &str) -> (EngineDeps, Arc<MockEmbedder>, Arc<MockClient>) {
    let embedder = Arc::new(MockEmbedder::new(DIMENSIONS));
    let llm = Arc::new(MockClient::with_reply("Answer from context."));
    let deps = EngineDeps {
        source: Arc::new(StaticSource::new(text, 1)),
        embedder: Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        llm: Arc::clone(&llm) as Arc<dyn LlmClient>,
    };
    (deps, embedder, llm)
}

#[tokio::test]
async fn test_relevant_chunk_ranks_first() {
    let dir = TempDir::new().unwrap();
    let (deps, _, _) = deps_for(&topical_document());

    let mut engine = RagEngine::new(
        "topics.txt",
        ChunkParams {
            chunk_size: 201,
            overlap: 0,
        },
        deps,
        IndexStore::new(dir.path()),
    );
    engine.ingest(false).await.unwrap();
    assert_eq!(engine.chunk_count(), 3);

    // Trigram embeddings are content-aware enough to separate the topics
    let hits = engine
        .search("rust programming language safety", 3)
        .await
        .unwrap();
    assert!(hits[0].text.contains("Rust"));
    assert!(hits[0].score > hits[1].score);

    let hits = engine.search("boiling pasta ingredients", 3).await.unwrap();
    assert!(hits[0].text.contains("pasta"));

    let hits = engine.search("tennis tournaments courts", 3).await.unwrap();
    assert!(hits[0].text.contains("Tennis"));
}

#[tokio::test]
async fn test_persisted_record_wire_format() {
    let dir = TempDir::new().unwrap();
    let (deps, _, _) = deps_for(&topical_document());
    let store = IndexStore::new(dir.path());

    let mut engine = RagEngine::new(
        "docs/topics.pdf",
        ChunkParams::default(),
        deps,
        store.clone(),
    );
    engine.ingest(false).await.unwrap();

    // One JSON file per document, named after the document key
    let record_path = store.record_path("topics");
    assert!(record_path.exists());
    assert!(record_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("topics_embeddings.json"));

    // The record is a structured document with the four agreed fields
    let raw = std::fs::read_to_string(&record_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["document_path"], "docs/topics.pdf");
    assert_eq!(value["model"], "trigram-v1");
    assert!(value["chunks"].as_array().is_some());
    assert!(value["embeddings"].as_array().is_some());
    assert_eq!(
        value["chunks"].as_array().unwrap().len(),
        value["embeddings"].as_array().unwrap().len()
    );
}

#[tokio::test]
async fn test_full_flow_through_cache() {
    let dir = TempDir::new().unwrap();
    let (deps, embedder, _) = deps_for(&topical_document());

    let cache = EngineCache::new(
        deps,
        IndexStore::new(dir.path().join("embeddings")),
        ChunkParams::default(),
        None,
    );

    let doc = Path::new("docs/topics.pdf");

    let answer = cache
        .answer(doc, "what is rust?", 2, "test-model")
        .await
        .unwrap();
    assert_eq!(answer, "Answer from context.");
    let calls_after_first = embedder.batch_calls();

    // Query embedding costs one call per question; ingestion never reruns
    cache
        .answer(doc, "how do you cook pasta?", 2, "test-model")
        .await
        .unwrap();
    assert_eq!(embedder.batch_calls(), calls_after_first + 1);

    let snippets = cache
        .search_only(doc, "tennis courts", 2)
        .await
        .unwrap();
    assert!(snippets.contains("**Result 1**"));
}

#[tokio::test]
async fn test_restart_reuses_persisted_record() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::new(dir.path());

    {
        let (deps, _, _) = deps_for(&topical_document());
        let mut engine =
            RagEngine::new("topics.txt", ChunkParams::default(), deps, store.clone());
        engine.ingest(false).await.unwrap();
    }

    // A fresh process ingests the same document: the record satisfies it
    // without any embedding traffic, and search still works.
    let (deps, embedder, _) = deps_for(&topical_document());
    let mut engine = RagEngine::new("topics.txt", ChunkParams::default(), deps, store);
    let stats = engine.ingest(false).await.unwrap();

    assert!(stats.from_cache);
    assert_eq!(embedder.batch_calls(), 0);

    let hits = engine.search("rust", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(embedder.batch_calls(), 1); // just the query embedding
}
