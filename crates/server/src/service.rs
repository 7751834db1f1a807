//! One chat turn, end to end.
//!
//! Thin coordination glue: a turn that names a document is answered through
//! the shared engine cache (retrieval-augmented); a plain turn is a chat
//! completion over the session's recent history. Either way the exchange is
//! recorded in the session store.

use crate::store::{ChatTurn, SessionStore};
use chrono::Utc;
use docchat_core::AppResult;
use docchat_llm::{ChatRequest, LlmClient, TokenUsage};
use docchat_rag::EngineCache;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

/// System instruction for plain (non-retrieval) chat turns.
const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Response cap for plain chat turns.
const CHAT_MAX_TOKENS: u32 = 200;

/// How many prior turns are replayed as context.
const HISTORY_LIMIT: usize = 10;

/// One incoming turn.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    /// Username the session belongs to
    pub username: String,

    /// The user's latest prompt
    pub prompt: String,

    /// Document to answer from; absent for plain chat
    #[serde(default)]
    pub document: Option<PathBuf>,

    /// Number of context chunks for retrieval turns
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Outcome of a processed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub usage: TokenUsage,
}

/// Chat orchestration shared across requests.
pub struct ChatService {
    store: Arc<SessionStore>,
    cache: Arc<EngineCache>,
    llm: Arc<dyn LlmClient>,
    model: String,
    default_top_k: usize,
}

impl ChatService {
    pub fn new(
        store: Arc<SessionStore>,
        cache: Arc<EngineCache>,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        default_top_k: usize,
    ) -> Self {
        Self {
            store,
            cache,
            llm,
            model: model.into(),
            default_top_k,
        }
    }

    /// Session store backing this service.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Process one turn for a session and record it.
    pub async fn run_turn(&self, session_id: &str, request: &TurnRequest) -> AppResult<TurnOutcome> {
        let outcome = if let Some(ref document) = request.document {
            let top_k = request.top_k.unwrap_or(self.default_top_k);
            tracing::info!(
                "Retrieval turn for session '{}' (document: {}, top_k: {})",
                session_id,
                document.display(),
                top_k
            );

            let engine = self.cache.get_or_ingest(document).await?;
            let engine = engine.read().await;
            let response = engine
                .answer_full(&request.prompt, top_k, &self.model)
                .await?;

            TurnOutcome {
                response: response.content,
                usage: response.usage,
            }
        } else {
            tracing::info!("Plain chat turn for session '{}'", session_id);

            let history = self
                .store
                .recent_turns(&request.username, session_id, HISTORY_LIMIT)?;
            let prompt = build_history_prompt(&history, &request.prompt);

            let chat_request = ChatRequest::new(prompt, &self.model)
                .with_system(CHAT_SYSTEM_PROMPT)
                .with_max_tokens(CHAT_MAX_TOKENS);
            let response = self.llm.complete(&chat_request).await?;

            TurnOutcome {
                response: response.content,
                usage: response.usage,
            }
        };

        self.store.append_turn(&ChatTurn {
            session_id: session_id.to_string(),
            username: request.username.clone(),
            user_prompt: request.prompt.clone(),
            assistant_response: outcome.response.clone(),
            prompt_tokens: outcome.usage.prompt_tokens,
            completion_tokens: outcome.usage.completion_tokens,
            created_at: Utc::now(),
        })?;

        Ok(outcome)
    }
}

/// Replay prior turns ahead of the new prompt.
fn build_history_prompt(history: &[ChatTurn], prompt: &str) -> String {
    if history.is_empty() {
        return prompt.to_string();
    }

    let mut lines = Vec::with_capacity(history.len() * 2 + 1);
    for turn in history {
        lines.push(format!("User: {}", turn.user_prompt));
        lines.push(format!("Assistant: {}", turn.assistant_response));
    }
    lines.push(format!("User: {}", prompt));
    lines.join("\n")
}
