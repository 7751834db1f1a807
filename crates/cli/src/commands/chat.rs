//! Chat command handler.
//!
//! Interactive loop against a session. With `--document` every prompt is
//! answered from the document via retrieval; without it, prompts are plain
//! chat completions streamed to stdout. Turns persist in the session
//! database either way.

use super::{build_deps, build_store, chunk_params};
use chrono::Utc;
use clap::Args;
use docchat_core::{AppConfig, AppResult};
use docchat_llm::{ChatRequest, TokenUsage};
use docchat_rag::RagEngine;
use docchat_server::{ChatTurn, SessionStore};
use futures::StreamExt;
use std::io::{BufRead, Write};
use std::path::PathBuf;

const CHAT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const HISTORY_LIMIT: usize = 10;

/// Interactive chat session
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Document to ground answers in; plain chat when omitted
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Resume an existing session id
    #[arg(long)]
    pub session: Option<String>,

    /// Username the session belongs to
    #[arg(short, long, default_value = "local")]
    pub user: String,

    /// Number of context chunks for document answers
    #[arg(short = 'k', long, default_value = "3")]
    pub top_k: usize,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let deps = build_deps(config)?;
        let sessions = SessionStore::open(&config.sessions_db_path())?;
        let session_id = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let engine = if let Some(ref document) = self.document {
            let mut engine = RagEngine::new(
                document,
                chunk_params(config, None, None),
                deps.clone(),
                build_store(config),
            );
            let stats = engine.ingest(false).await?;
            println!(
                "Loaded '{}' ({} chunks{})",
                engine.doc_key(),
                stats.chunk_count,
                if stats.from_cache { ", cached" } else { "" }
            );
            Some(engine)
        } else {
            None
        };

        println!("Session {} (type 'exit' to quit)", session_id);

        let stdin = std::io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            print!("\nYou: ");
            std::io::stdout().flush().ok();

            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;
            let input = line.trim();

            if input.is_empty() {
                continue;
            }
            if matches!(input, "exit" | "quit" | "q") {
                println!("Goodbye!");
                break;
            }

            let turn = match self
                .run_prompt(config, &deps, &sessions, &session_id, engine.as_ref(), input)
                .await
            {
                Ok(turn) => turn,
                Err(e) => {
                    // A failed turn doesn't end the session
                    eprintln!("Error: {}", e);
                    continue;
                }
            };

            sessions.append_turn(&ChatTurn {
                session_id: session_id.clone(),
                username: self.user.clone(),
                user_prompt: input.to_string(),
                assistant_response: turn.0,
                prompt_tokens: turn.1.prompt_tokens,
                completion_tokens: turn.1.completion_tokens,
                created_at: Utc::now(),
            })?;
        }

        Ok(())
    }

    async fn run_prompt(
        &self,
        config: &AppConfig,
        deps: &docchat_rag::EngineDeps,
        sessions: &SessionStore,
        session_id: &str,
        engine: Option<&RagEngine>,
        input: &str,
    ) -> AppResult<(String, TokenUsage)> {
        if let Some(engine) = engine {
            let response = engine.answer_full(input, self.top_k, &config.model).await?;
            println!("\nAssistant: {}", response.content);
            return Ok((response.content, response.usage));
        }

        // Plain chat: replay recent history, stream the reply to stdout
        let history = sessions.recent_turns(&self.user, session_id, HISTORY_LIMIT)?;
        let mut prompt_lines: Vec<String> = Vec::with_capacity(history.len() * 2 + 1);
        for turn in &history {
            prompt_lines.push(format!("User: {}", turn.user_prompt));
            prompt_lines.push(format!("Assistant: {}", turn.assistant_response));
        }
        prompt_lines.push(format!("User: {}", input));

        let request = ChatRequest::new(prompt_lines.join("\n"), &config.model)
            .with_system(CHAT_SYSTEM_PROMPT)
            .with_streaming();

        print!("\nAssistant: ");
        std::io::stdout().flush().ok();

        let mut stream = deps.llm.stream(&request).await?;
        let mut full_content = String::new();
        let mut usage = TokenUsage::default();

        while let Some(result) = stream.next().await {
            let chunk = result?;

            if !chunk.content.is_empty() {
                full_content.push_str(&chunk.content);
                print!("{}", chunk.content);
                std::io::stdout().flush().ok();
            }

            if chunk.done {
                if let Some(u) = chunk.usage {
                    usage = u;
                }
                break;
            }
        }
        println!();

        Ok((full_content, usage))
    }
}
