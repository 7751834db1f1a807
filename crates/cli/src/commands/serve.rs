//! Serve command handler.
//!
//! Runs the HTTP API with a shared engine cache and the workspace session
//! database.

use super::{build_deps, build_store, chunk_params};
use clap::Args;
use docchat_core::{AppConfig, AppResult};
use docchat_rag::EngineCache;
use docchat_server::{routes, AppState, ChatService, SessionStore};
use std::sync::Arc;

/// Run the HTTP API server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Port to listen on
    #[arg(short = 'P', long, default_value = "8000")]
    pub port: u16,

    /// Bound on cached engines (unbounded when omitted)
    #[arg(long)]
    pub cache_capacity: Option<usize>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let deps = build_deps(config)?;
        let llm = Arc::clone(&deps.llm);

        let cache = Arc::new(EngineCache::new(
            deps,
            build_store(config),
            chunk_params(config, None, None),
            self.cache_capacity,
        ));

        let sessions = Arc::new(SessionStore::open(&config.sessions_db_path())?);

        let service = Arc::new(ChatService::new(
            sessions,
            cache,
            llm,
            &config.model,
            config.retrieval.top_k,
        ));

        routes::serve(AppState { service }, self.port).await
    }
}
