//! Ingest command handler.
//!
//! Runs the chunk → embed → persist pipeline for one document or a
//! directory of documents.

use super::{build_deps, build_store, chunk_params};
use clap::Args;
use docchat_core::{AppConfig, AppError, AppResult};
use docchat_rag::{discover_documents, doc_key, RagEngine};
use std::path::PathBuf;

/// Ingest a document into the index
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Document file or directory of documents
    pub path: PathBuf,

    /// Rebuild the index record even if one already exists
    #[arg(long)]
    pub force: bool,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Overlap between adjacent chunks in characters
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.path);

        let deps = build_deps(config)?;
        let store = build_store(config);
        let params = chunk_params(config, self.chunk_size, self.overlap);

        let paths = if self.path.is_dir() {
            let found = discover_documents(&self.path)?;
            if found.is_empty() {
                return Err(AppError::Load(format!(
                    "No supported documents under {}",
                    self.path.display()
                )));
            }
            found
        } else {
            vec![self.path.clone()]
        };

        let mut results = Vec::new();
        for path in &paths {
            let mut engine = RagEngine::new(path, params, deps.clone(), store.clone());
            let stats = engine.ingest(self.force).await?;
            results.push((doc_key(path), stats));
        }

        if self.json {
            let output: Vec<_> = results
                .iter()
                .map(|(key, stats)| {
                    serde_json::json!({
                        "docKey": key,
                        "chunkCount": stats.chunk_count,
                        "pageCount": stats.page_count,
                        "fromCache": stats.from_cache,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&output)
                    .map_err(|e| AppError::Serialization(e.to_string()))?
            );
        } else {
            for (key, stats) in &results {
                if stats.from_cache {
                    println!("{}: {} chunks (cached)", key, stats.chunk_count);
                } else {
                    println!(
                        "{}: {} chunks from {} pages",
                        key,
                        stats.chunk_count,
                        stats.page_count.unwrap_or(1)
                    );
                }
            }
        }

        Ok(())
    }
}
