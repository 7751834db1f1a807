//! Embedding generation for document chunks and queries.
//!
//! A single `EmbeddingProvider` trait covers batched chunk embedding during
//! ingestion and single-query embedding at search time; a query goes through
//! the same path as a batch of one.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{MockEmbedder, OpenAiEmbedder};
