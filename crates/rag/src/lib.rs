//! Document retrieval core for docchat.
//!
//! Converts documents into searchable chunks, maintains per-document vector
//! index records, performs cosine-similarity search, and synthesizes answers
//! through an injected chat-completion collaborator. Engines are cached per
//! document so repeated queries skip re-ingestion.
//!
//! Data flow: document path → chunker → text chunks → embedder → vectors →
//! index store (persist/reload) → similarity search → answer generation.

pub mod cache;
pub mod chunker;
pub mod document;
pub mod embeddings;
pub mod engine;
pub mod search;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use cache::{EngineCache, EngineHandle};
pub use chunker::chunk_text;
pub use document::{discover_documents, DocumentSource, ExtractedDocument, FileSource, StaticSource};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use engine::{ChunkParams, EngineDeps, IngestState, IngestStats, RagEngine};
pub use search::{cosine_similarity, SearchHit};
pub use store::{doc_key, IndexRecord, IndexStats, IndexStore};
