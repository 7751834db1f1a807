//! Chat-completion client factory.
//!
//! Resolves a provider name to a concrete client implementation, injecting
//! endpoint and credentials.

use crate::client::LlmClient;
use crate::providers::{MockClient, OpenAiClient};
use std::sync::Arc;

/// Create a chat client for the named provider.
///
/// # Arguments
/// * `provider` - Provider identifier ("openai", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (required by "openai")
///
/// # Errors
/// Returns an error string when the provider is unknown or required
/// credentials are missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> Result<Arc<dyn LlmClient>, String> {
    match provider.to_lowercase().as_str() {
        "openai" => {
            let Some(key) = api_key else {
                return Err("OpenAI provider requires an API key".to_string());
            };
            let client = match endpoint {
                Some(url) => OpenAiClient::with_base_url(url, key),
                None => OpenAiClient::new(key),
            };
            Ok(Arc::new(client))
        }
        "mock" => Ok(Arc::new(MockClient::new())),
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}
