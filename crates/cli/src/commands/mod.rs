//! Command handlers for the docchat CLI.

pub mod ask;
pub mod chat;
pub mod ingest;
pub mod search;
pub mod serve;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;

use docchat_core::{config::ProviderConfig, AppConfig, AppError, AppResult};
use docchat_llm::create_client;
use docchat_rag::embeddings::{create_provider, EmbeddingConfig};
use docchat_rag::{ChunkParams, EngineDeps, FileSource, IndexStore};
use std::sync::Arc;

/// Wire up the engine collaborators from configuration.
pub(crate) fn build_deps(config: &AppConfig) -> AppResult<EngineDeps> {
    let embedding_config = embedding_config_from(config);
    let embedding_key = config.resolve_api_key(&config.embedding_provider);
    let embedder = create_provider(&embedding_config, embedding_key.as_deref())?;

    let chat_key = config.resolve_api_key(&config.provider);
    let chat_endpoint = config.resolve_endpoint(&config.provider);
    let llm = create_client(&config.provider, chat_endpoint.as_deref(), chat_key.as_deref())
        .map_err(AppError::Config)?;

    Ok(EngineDeps {
        source: Arc::new(FileSource::new()),
        embedder,
        llm,
    })
}

/// Index store rooted in the workspace.
pub(crate) fn build_store(config: &AppConfig) -> IndexStore {
    IndexStore::new(config.index_dir())
}

/// Chunk parameters with optional CLI overrides.
pub(crate) fn chunk_params(
    config: &AppConfig,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> ChunkParams {
    ChunkParams {
        chunk_size: chunk_size.unwrap_or(config.retrieval.chunk_size),
        overlap: overlap.unwrap_or(config.retrieval.overlap),
    }
}

fn embedding_config_from(config: &AppConfig) -> EmbeddingConfig {
    match config.get_provider_config(&config.embedding_provider) {
        Some(ProviderConfig::Mock { dimensions }) => EmbeddingConfig::mock(*dimensions),
        _ => EmbeddingConfig {
            provider: config.embedding_provider.clone(),
            model: config.embedding_model.clone(),
            endpoint: config.resolve_endpoint(&config.embedding_provider),
            ..EmbeddingConfig::default()
        },
    }
}
