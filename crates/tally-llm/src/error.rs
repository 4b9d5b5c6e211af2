use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode response body: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("Invalid API key format")]
    InvalidApiKey,

    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl LlmError {
    /// Classify a transport error, separating deadline expiry from other faults.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network",
            Self::Api { .. } => "api",
            Self::Decode(_) => "decode",
            Self::InvalidApiKey => "invalid_api_key",
            Self::Client(_) => "client",
        }
    }

    /// Structured payload shown to the user instead of a bare message.
    pub fn to_payload(&self) -> Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Api { status, .. } = self {
            error["status"] = json!(status);
        }
        json!({ "error": error })
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
