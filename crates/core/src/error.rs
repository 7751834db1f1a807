//! Error types for the docchat service.
//!
//! This module defines a unified error enum covering every error category in
//! the application: configuration, retrieval readiness, external service
//! calls, document loading, session storage, and I/O.

use thiserror::Error;

/// Unified error type for docchat.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration (bad chunking parameters, unknown provider, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Search or answer requested before ingestion completed, or on an
    /// empty index
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Embedding or answer-generation call failed (network, quota,
    /// malformed response)
    #[error("Service error: {0}")]
    Service(String),

    /// Source document missing or unreadable
    #[error("Load error: {0}")]
    Load(String),

    /// Chat-session storage errors
    #[error("Session error: {0}")]
    Session(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
