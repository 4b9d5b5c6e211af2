pub mod types;
pub mod traits;
pub mod config;
pub mod error;
pub mod client;

pub use traits::{ChatClient, ChatRequest, ChatResponse, ChatOptions, TokenUsage};
pub use config::{ClientConfig, DEFAULT_TIMEOUT};
pub use client::OpenAICompatibleClient;
pub use error::{LlmError, Result};
pub use types::Message;
