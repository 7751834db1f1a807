//! Ask command handler.
//!
//! Answers a question from a document via retrieval-augmented generation.

use super::{build_deps, build_store, chunk_params};
use clap::Args;
use docchat_core::{AppConfig, AppError, AppResult};
use docchat_rag::RagEngine;
use std::path::PathBuf;

/// Answer a question from a document
#[derive(Args, Debug)]
pub struct AskCommand {
    /// Document to answer from
    pub path: PathBuf,

    /// The question to answer
    pub query: String,

    /// Number of context chunks to use
    #[arg(short = 'k', long, default_value = "3")]
    pub top_k: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command for {:?}", self.path);

        let deps = build_deps(config)?;
        let store = build_store(config);

        let mut engine = RagEngine::new(
            &self.path,
            chunk_params(config, None, None),
            deps,
            store,
        );
        engine.ingest(false).await?;

        let response = engine
            .answer_full(&self.query, self.top_k, &config.model)
            .await?;

        if self.json {
            let output = serde_json::json!({
                "answer": response.content,
                "model": response.model,
                "provider": config.provider,
                "docKey": engine.doc_key(),
                "usage": {
                    "promptTokens": response.usage.prompt_tokens,
                    "completionTokens": response.usage.completion_tokens,
                    "totalTokens": response.usage.total_tokens
                }
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output)
                    .map_err(|e| AppError::Serialization(e.to_string()))?
            );
        } else {
            println!("{}", response.content);

            if tracing::enabled!(tracing::Level::DEBUG) {
                tracing::debug!(
                    "Token usage - Prompt: {}, Completion: {}, Total: {}",
                    response.usage.prompt_tokens,
                    response.usage.completion_tokens,
                    response.usage.total_tokens
                );
            }
        }

        Ok(())
    }
}
