//! OpenAI-compatible embedding provider.
//!
//! Speaks the `/v1/embeddings` wire format. Requests are issued in
//! fixed-size batches to respect service-side limits; batches run
//! sequentially and results are concatenated in input order.

use crate::embeddings::config::EmbeddingConfig;
use crate::embeddings::provider::EmbeddingProvider;
use docchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Request timeout at the collaborator boundary.
const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-compatible embedding client.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Create a new embedder from configuration.
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> Self {
        let base_url = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
        }
    }

    /// Embed one batch (at most `batch_size` texts).
    async fn embed_group(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Service(format!("Failed to send embedding request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Service(format!(
                "Embedding API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Service(format!("Failed to parse embedding response: {}", e)))?;

        if body.data.len() != texts.len() {
            return Err(AppError::Service(format!(
                "Embedding count mismatch: got {}, expected {}",
                body.data.len(),
                texts.len()
            )));
        }

        // The service tags each vector with its input index; order by it so
        // position i always corresponds to input i.
        let mut items = body.data;
        items.sort_by_key(|item| item.index);

        let mut embeddings = Vec::with_capacity(items.len());
        for item in items {
            if item.embedding.len() != self.dimensions {
                return Err(AppError::Service(format!(
                    "Unexpected embedding dimensions: got {}, expected {}",
                    item.embedding.len(),
                    self.dimensions
                )));
            }
            embeddings.push(item.embedding);
        }

        Ok(embeddings)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());

        for (i, group) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(
                "Embedding batch {}/{} ({} texts, model: {})",
                i + 1,
                texts.len().div_ceil(self.batch_size),
                group.len(),
                self.model
            );

            // Any group failure aborts the whole operation; nothing partial
            // is returned to the caller.
            let group_embeddings = self.embed_group(group).await?;
            embeddings.extend(group_embeddings);
        }

        tracing::info!(
            "Embedded {} texts in {} batches",
            texts.len(),
            texts.len().div_ceil(self.batch_size)
        );

        Ok(embeddings)
    }
}
