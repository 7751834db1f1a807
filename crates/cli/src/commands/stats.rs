//! Stats command handler.
//!
//! Shows what the index store holds, per document or for the whole
//! workspace.

use super::build_store;
use clap::Args;
use docchat_core::{AppConfig, AppError, AppResult};
use docchat_rag::doc_key;
use std::path::PathBuf;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Document to report on; all records when omitted
    pub path: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = build_store(config);

        let keys = match &self.path {
            Some(path) => vec![doc_key(path)],
            None => store.list_keys()?,
        };

        let mut all_stats = Vec::new();
        for key in &keys {
            match store.stats(key)? {
                Some(stats) => all_stats.push(stats),
                None => {
                    return Err(AppError::NotReady(format!(
                        "No index record for '{}'. Run 'docchat ingest' first.",
                        key
                    )))
                }
            }
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&all_stats)
                    .map_err(|e| AppError::Serialization(e.to_string()))?
            );
        } else if all_stats.is_empty() {
            println!("No index records in {:?}", store.dir());
        } else {
            for stats in &all_stats {
                println!(
                    "{}: {} chunks, {} bytes, model {} ({})",
                    stats.doc_key,
                    stats.chunk_count,
                    stats.size_bytes,
                    stats.model,
                    stats.document_path
                );
            }
        }

        Ok(())
    }
}
