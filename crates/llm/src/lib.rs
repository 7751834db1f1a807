//! Chat-completion integration crate for docchat.
//!
//! Provides a provider-agnostic abstraction for the answer-generation
//! collaborator. Concrete providers are selected at runtime through a
//! factory, so tests substitute a deterministic mock.
//!
//! # Providers
//! - **OpenAI-compatible**: hosted or self-hosted `/v1/chat/completions`
//! - **Mock**: canned replies for tests
//!
//! # Example
//! ```no_run
//! use docchat_llm::{ChatRequest, LlmClient, providers::OpenAiClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClient::new("sk-...");
//! let request = ChatRequest::new("Hello, world!", "gpt-4o-mini");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmClient, TokenUsage};
pub use factory::create_client;
pub use providers::{MockClient, OpenAiClient};
