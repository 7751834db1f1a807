//! HTTP service layer for docchat.
//!
//! Thin coordination glue around the retrieval core: axum conversation
//! endpoints, a SQLite-backed chat-session store, and the per-turn
//! orchestration that connects them to the engine cache.

pub mod routes;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use routes::{build_router, serve, AppState};
pub use service::{ChatService, TurnOutcome, TurnRequest};
pub use store::{ChatTurn, SessionStore, SessionSummary, TokenTotals};
