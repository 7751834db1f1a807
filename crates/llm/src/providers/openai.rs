//! OpenAI-compatible chat-completion provider.
//!
//! Speaks the `/v1/chat/completions` wire format, which several hosted and
//! self-hosted inference servers implement.

use crate::client::{ChatRequest, ChatResponse, ChatStream, ChatStreamChunk, LlmClient, TokenUsage};
use docchat_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Request timeout at the collaborator boundary.
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat client.
pub struct OpenAiClient {
    /// Base URL of the API (up to and including the version segment)
    base_url: String,

    /// Bearer token
    api_key: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client against the default OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a client against a custom OpenAI-compatible endpoint.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert a ChatRequest to the wire format.
    fn to_api_request<'a>(&self, request: &'a ChatRequest, stream: bool) -> CompletionRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ApiMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ApiMessage {
            role: "user",
            content: &request.prompt,
        });

        CompletionRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn send(&self, api_request: &CompletionRequest<'_>) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(api_request)
            .send()
            .await
            .map_err(|e| AppError::Service(format!("Failed to send chat request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Service(format!(
                "Chat API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        tracing::info!("Sending completion request (model: {})", request.model);
        tracing::debug!("Request: {:?}", request);

        let api_request = self.to_api_request(request, false);
        let response = self.send(&api_request).await?;

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Service(format!("Failed to parse chat response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Service("Chat response contained no choices".to_string()))?;

        let usage = completion
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        tracing::info!("Received completion ({} tokens)", usage.total_tokens);

        Ok(ChatResponse {
            content,
            model: completion.model,
            usage,
        })
    }

    async fn stream(&self, request: &ChatRequest) -> AppResult<ChatStream> {
        tracing::info!("Starting streaming request (model: {})", request.model);

        let api_request = self.to_api_request(request, true);
        let response = self.send(&api_request).await?;

        // The endpoint answers with server-sent events, one `data:` line per
        // delta, terminated by `data: [DONE]`. A network frame can split a
        // line, so we buffer and only parse complete lines.
        let mut buf = String::new();
        let stream = response.bytes_stream().map(move |result| {
            let bytes = result.map_err(|e| AppError::Service(format!("Stream error: {}", e)))?;
            buf.push_str(&String::from_utf8_lossy(&bytes));

            let mut chunks: Vec<AppResult<ChatStreamChunk>> = Vec::new();
            while let Some(pos) = buf.find('\n') {
                let line = buf[..pos].trim().to_string();
                buf.drain(..=pos);

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    chunks.push(Ok(ChatStreamChunk {
                        content: String::new(),
                        done: true,
                        usage: None,
                    }));
                    continue;
                }

                match serde_json::from_str::<StreamEvent>(data) {
                    Ok(event) => {
                        let choice = event.choices.into_iter().next();
                        let content = choice
                            .as_ref()
                            .and_then(|c| c.delta.content.clone())
                            .unwrap_or_default();
                        let done = choice.and_then(|c| c.finish_reason).is_some();
                        chunks.push(Ok(ChatStreamChunk {
                            content,
                            done,
                            usage: None,
                        }));
                    }
                    Err(e) => chunks.push(Err(AppError::Service(format!(
                        "Failed to parse stream event: {}",
                        e
                    )))),
                }
            }

            Ok(futures::stream::iter(chunks))
        });

        Ok(Box::pin(stream.flat_map(|result| match result {
            Ok(chunks) => chunks,
            Err(e) => futures::stream::iter(vec![Err(e)]),
        })))
    }
}
