//! Docchat Core Library
//!
//! Foundational utilities for the docchat service:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, RetrievalConfig};
pub use error::{AppError, AppResult};
