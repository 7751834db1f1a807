//! Search command handler.
//!
//! Ranked snippet retrieval without answer generation: the cheap,
//! read-only way to explore a document.

use super::{build_deps, build_store, chunk_params};
use clap::Args;
use docchat_core::{AppConfig, AppError, AppResult};
use docchat_rag::RagEngine;
use std::path::PathBuf;

/// Search a document for relevant chunks
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Document to search
    pub path: PathBuf,

    /// The search query
    pub query: String,

    /// Number of top results to return
    #[arg(short = 'k', long, default_value = "3")]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command for {:?}", self.path);

        let deps = build_deps(config)?;
        let store = build_store(config);

        let mut engine = RagEngine::new(
            &self.path,
            chunk_params(config, None, None),
            deps,
            store,
        );
        engine.ingest(false).await?;

        if self.json {
            let hits = engine.search(&self.query, self.top_k).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&hits)
                    .map_err(|e| AppError::Serialization(e.to_string()))?
            );
        } else {
            let formatted = engine.search_only(&self.query, self.top_k).await?;
            println!("{}", formatted);
        }

        Ok(())
    }
}
