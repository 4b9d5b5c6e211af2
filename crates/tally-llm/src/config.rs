// Connection settings for a single OpenAI-compatible endpoint

use secrecy::SecretString;
use std::time::Duration;

/// Deadline applied to every request unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint, credentials and deadline for the chat client
#[derive(Debug)]
pub struct ClientConfig {
    /// Full chat-completions URL, e.g. "https://api.deepseek.com/chat/completions"
    pub api_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<SecretString>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_timeout() {
        let config = ClientConfig::new(
            "https://api.deepseek.com/chat/completions",
            SecretString::from("test-key".to_string()),
        );
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.api_key.expose_secret(), "test-key");
    }

    #[test]
    fn test_custom_timeout() {
        let config = ClientConfig::new("http://localhost/v1", SecretString::from("k".to_string()))
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ClientConfig::new("http://localhost/v1", SecretString::from("sk-live".to_string()));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-live"));
    }
}
