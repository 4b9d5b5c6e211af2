// Chat-completions client for OpenAI-compatible endpoints (DeepSeek, OpenAI, ...)

use crate::config::ClientConfig;
use crate::error::{LlmError, Result};
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde_json::Value;
use std::time::Duration;
use tracing::{Instrument, Span};

/// OpenAI-compatible client (HTTP direct, no SDK)
#[derive(Debug)]
pub struct OpenAICompatibleClient {
    http_client: reqwest::Client,
    api_url: String,
    timeout: Duration,
    span: Span,
}

impl OpenAICompatibleClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|_| LlmError::InvalidApiKey)?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(LlmError::Client)?;

        let span = tracing::info_span!("chat_client", api_url = %config.api_url);

        Ok(Self {
            http_client,
            api_url: config.api_url,
            timeout: config.timeout,
            span,
        })
    }

    /// Log inside the caller's span instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Build chat completion request payload
    pub fn build_chat_request(request: &ChatRequest) -> Value {
        let mut payload = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
        });

        let ChatOptions {
            temperature,
            max_tokens,
            top_p,
        } = &request.options;

        if let Some(obj) = payload.as_object_mut() {
            if let Some(temp) = temperature {
                obj.insert("temperature".to_string(), serde_json::json!(temp));
            }
            if let Some(max_tokens) = max_tokens {
                obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
            }
            if let Some(top_p) = top_p {
                obj.insert("top_p".to_string(), serde_json::json!(top_p));
            }
        }

        payload
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = Self::build_chat_request(&request);

        tracing::info!(model = %request.model, "Sending chat completion request");

        let response = self
            .http_client
            .post(&self.api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Chat completion request rejected");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.timeout)
            } else {
                LlmError::Decode(e)
            }
        })?;

        let response = ChatResponse::from_raw(raw);
        tracing::info!(
            model = response.model.as_deref().unwrap_or("unknown"),
            total_tokens = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0),
            "Chat completion received"
        );

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for OpenAICompatibleClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.send(request).instrument(self.span.clone()).await
    }
}
