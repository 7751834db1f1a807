//! Cross-module tests for the retrieval core.

mod retrieval_flow;
