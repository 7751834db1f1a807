//! Chat-completion provider implementations.

pub mod mock;
pub mod openai;

pub use mock::MockClient;
pub use openai::OpenAiClient;
