//! Mock chat client for tests.
//!
//! Returns a canned reply and records every request it sees, so tests can
//! assert on call counts and prompt contents without touching the network.

use crate::client::{ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmClient, TokenUsage};
use docchat_core::AppResult;
use std::sync::Mutex;

/// Deterministic chat client that never leaves the process.
pub struct MockClient {
    reply: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockClient {
    /// Create a mock with a default canned reply.
    pub fn new() -> Self {
        Self::with_reply("This is a mock reply.")
    }

    /// Create a mock that answers every request with `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    fn record(&self, request: &ChatRequest) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.record(request);
        Ok(ChatResponse {
            content: self.reply.clone(),
            model: request.model.clone(),
            usage: TokenUsage::new(12, 24),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        self.record(request);

        let mut chunks: Vec<AppResult<ChatStreamChunk>> = self
            .reply
            .split_inclusive(' ')
            .map(|word| {
                Ok(ChatStreamChunk {
                    content: word.to_string(),
                    done: false,
                    usage: None,
                })
            })
            .collect();
        chunks.push(Ok(ChatStreamChunk {
            content: String::new(),
            done: true,
            usage: Some(TokenUsage::new(12, 24)),
        }));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_complete_records_requests() {
        let client = MockClient::with_reply("Paris.");
        assert_eq!(client.request_count(), 0);

        let request = ChatRequest::new("Capital of France?", "test-model");
        let response = client.complete(&request).await.unwrap();

        assert_eq!(response.content, "Paris.");
        assert_eq!(response.model, "test-model");
        assert_eq!(client.request_count(), 1);
        assert_eq!(
            client.last_request().unwrap().prompt,
            "Capital of France?"
        );
    }

    #[tokio::test]
    async fn test_stream_reassembles_reply() {
        let client = MockClient::with_reply("one two three");
        let request = ChatRequest::new("count", "test-model").with_streaming();

        let mut stream = client.stream(&request).await.unwrap();
        let mut full = String::new();
        let mut saw_done = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            full.push_str(&chunk.content);
            if chunk.done {
                saw_done = true;
                assert!(chunk.usage.is_some());
            }
        }

        assert_eq!(full, "one two three");
        assert!(saw_done);
    }
}
