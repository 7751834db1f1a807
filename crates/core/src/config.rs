//! Configuration management for docchat.
//!
//! Configuration is merged from multiple sources, later sources winning:
//! - Built-in defaults
//! - Config file (`.docchat/config.yaml`)
//! - Environment variables (`DOCCHAT_*`)
//! - Command-line flags
//!
//! State is workspace-centric: index records and the session database live
//! under `.docchat/` in the workspace root.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docchat/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Chat-completion provider (e.g., "openai", "mock")
    pub provider: String,

    /// Chat-completion model identifier
    pub model: String,

    /// Embedding provider (e.g., "openai", "mock")
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// API key override (otherwise resolved from provider env vars)
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Retrieval defaults (chunking, top-k)
    pub retrieval: RetrievalConfig,

    /// Provider configurations from the config file
    pub providers: HashMap<String, ProviderConfig>,
}

/// Retrieval pipeline defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between adjacent chunks in characters
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Number of chunks retrieved per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_chunk_size() -> usize {
    500
}

fn default_overlap() -> usize {
    50
}

fn default_top_k() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            top_k: default_top_k(),
        }
    }
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        endpoint: Option<String>,
    },
    Mock {
        dimensions: usize,
    },
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    retrieval: Option<RetrievalConfig>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    #[serde(rename = "activeProvider")]
    active_provider: Option<String>,

    #[serde(rename = "activeEmbeddingProvider")]
    active_embedding_provider: Option<String>,

    #[serde(default)]
    providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_provider: "openai".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            retrieval: RetrievalConfig::default(),
            providers: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and the config file.
    ///
    /// Environment variables:
    /// - `DOCCHAT_WORKSPACE`: Override workspace path
    /// - `DOCCHAT_CONFIG`: Path to config file
    /// - `DOCCHAT_PROVIDER`: Chat provider
    /// - `DOCCHAT_MODEL`: Chat model identifier
    /// - `DOCCHAT_EMBEDDING_MODEL`: Embedding model identifier
    /// - `DOCCHAT_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCCHAT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCCHAT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.workspace.join(".docchat/config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override the config file
        if let Ok(provider) = std::env::var("DOCCHAT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("DOCCHAT_MODEL") {
            config.model = model;
        }

        if let Ok(embedding_model) = std::env::var("DOCCHAT_EMBEDDING_MODEL") {
            config.embedding_model = embedding_model;
        }

        if let Ok(key) = std::env::var("DOCCHAT_API_KEY") {
            config.api_key = Some(key);
        }

        if config.log_level.is_none() {
            config.log_level = std::env::var("RUST_LOG").ok();
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        if let Some(llm) = config_file.llm {
            if let Some(active) = llm.active_provider {
                result.provider = active;
            }
            if let Some(active_embedding) = llm.active_embedding_provider {
                result.embedding_provider = active_embedding;
            }

            // Pick up models from the active provider entries
            if let Some(ProviderConfig::OpenAI { model, .. }) =
                llm.providers.get(&result.provider)
            {
                result.model = model.clone();
            }
            if let Some(ProviderConfig::OpenAI {
                embedding_model: Some(em),
                ..
            }) = llm.providers.get(&result.embedding_provider)
            {
                result.embedding_model = em.clone();
            }

            result.providers = llm.providers;
        }

        Ok(result)
    }

    /// Apply CLI overrides, giving flags precedence over everything else.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docchat directory.
    pub fn docchat_dir(&self) -> PathBuf {
        self.workspace.join(".docchat")
    }

    /// Directory holding persisted index records, one JSON file per document.
    pub fn index_dir(&self) -> PathBuf {
        self.docchat_dir().join("embeddings")
    }

    /// Path of the chat-session database.
    pub fn sessions_db_path(&self) -> PathBuf {
        self.docchat_dir().join("sessions.db")
    }

    /// Ensure the .docchat directory exists.
    pub fn ensure_docchat_dir(&self) -> AppResult<()> {
        let dir = self.docchat_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docchat directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration for a named provider, if any.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider)
    }

    /// Resolve the API key for a provider.
    ///
    /// `DOCCHAT_API_KEY` wins; otherwise the provider's configured
    /// `apiKeyEnv` is consulted, falling back to `OPENAI_API_KEY` for the
    /// openai provider.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
            self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(api_key_env) {
                return Some(key);
            }
        }

        if provider == "openai" {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                return Some(key);
            }
        }

        None
    }

    /// Resolve a custom endpoint for a provider, if configured.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        match self.get_provider_config(provider) {
            Some(ProviderConfig::OpenAI { endpoint, .. }) => endpoint.clone(),
            _ => None,
        }
    }

    /// Validate configuration for the active providers.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["openai", "mock"];

        for provider in [&self.provider, &self.embedding_provider] {
            if !known_providers.contains(&provider.as_str()) {
                return Err(AppError::Config(format!(
                    "Unknown provider: {}. Supported: {}",
                    provider,
                    known_providers.join(", ")
                )));
            }
        }

        if self.retrieval.chunk_size == 0 {
            return Err(AppError::Config(
                "retrieval.chunk_size must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.overlap >= self.retrieval.chunk_size {
            return Err(AppError::Config(format!(
                "retrieval.overlap ({}) must be smaller than retrieval.chunk_size ({})",
                self.retrieval.overlap, self.retrieval.chunk_size
            )));
        }

        Ok(())
    }
}
