//! Decoding of raw chat-completion responses into [`UsageRecord`]s.
//!
//! The response is validated against a serde schema in one pass. Either every
//! required field resolves or a single `MalformedResponse` error is returned;
//! no partial record ever escapes.

use serde::Deserialize;
use serde_json::Value;
use tracing::Span;

use crate::error::{PersistError, Result};
use crate::models::UsageRecord;

#[derive(Debug, Deserialize)]
struct RawCompletion {
    id: String,
    created: i64,
    model: String,
    system_fingerprint: Option<String>,
    choices: Vec<RawChoice>,
    usage: RawUsage,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    message: RawMessage,
    finish_reason: Option<String>,
    logprobs: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
    // cached_tokens sits one level deeper than the cache hit/miss counters
    #[serde(default)]
    prompt_tokens_details: Option<RawPromptTokensDetails>,
    #[serde(default)]
    prompt_cache_hit_tokens: u64,
    #[serde(default)]
    prompt_cache_miss_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct RawPromptTokensDetails {
    #[serde(default)]
    cached_tokens: u64,
}

/// Map a raw response plus the caller's prompt into a usage record.
///
/// Only the first element of `choices` is consumed; an empty list is an error.
pub fn map_response(raw: &Value, prompt: &str) -> Result<UsageRecord> {
    let completion = RawCompletion::deserialize(raw)
        .map_err(|e| PersistError::MalformedResponse(e.to_string()))?;

    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| PersistError::MalformedResponse("`choices` is empty".to_string()))?;

    let usage = completion.usage;

    Ok(UsageRecord {
        usage_id: completion.id,
        created: completion.created,
        model: completion.model,
        system_fingerprint: completion.system_fingerprint,
        prompt: prompt.to_string(),
        completion: choice.message.content,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        total_tokens: usage.total_tokens,
        cached_tokens: usage
            .prompt_tokens_details
            .map(|d| d.cached_tokens)
            .unwrap_or(0),
        cache_hit_tokens: usage.prompt_cache_hit_tokens,
        cache_miss_tokens: usage.prompt_cache_miss_tokens,
        finish_reason: choice.finish_reason,
        logprobs: choice.logprobs,
    })
}

/// Response mapper bound to a logging span
pub struct ResponseMapper {
    span: Span,
}

impl ResponseMapper {
    pub fn new() -> Self {
        Self {
            span: tracing::info_span!("response_mapper"),
        }
    }

    pub fn with_span(span: Span) -> Self {
        Self { span }
    }

    pub fn map(&self, raw: &Value, prompt: &str) -> Result<UsageRecord> {
        let _enter = self.span.enter();
        match map_response(raw, prompt) {
            Ok(record) => {
                tracing::debug!(usage_id = %record.usage_id, "Response mapped to usage record");
                Ok(record)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Response could not be mapped; it will not be persisted");
                Err(err)
            }
        }
    }
}

impl Default for ResponseMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "8ecb4098-d4d8-4e6f-8e15-40fc49fa4409",
            "object": "chat.completion",
            "created": 1748990439,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Brasília."},
                "logprobs": null,
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 24,
                "completion_tokens": 4,
                "total_tokens": 28,
                "prompt_tokens_details": {"cached_tokens": 3},
                "prompt_cache_hit_tokens": 1,
                "prompt_cache_miss_tokens": 23
            },
            "system_fingerprint": "fp_8802369eaa_prod0425fp8"
        })
    }

    #[test]
    fn test_maps_every_field() {
        let record = map_response(&sample(), "Explique IA em uma frase.").unwrap();

        assert_eq!(record.usage_id, "8ecb4098-d4d8-4e6f-8e15-40fc49fa4409");
        assert_eq!(record.created, 1748990439);
        assert_eq!(record.model, "deepseek-chat");
        assert_eq!(
            record.system_fingerprint.as_deref(),
            Some("fp_8802369eaa_prod0425fp8")
        );
        assert_eq!(record.prompt, "Explique IA em uma frase.");
        assert_eq!(record.completion, "Brasília.");
        assert_eq!(record.prompt_tokens, 24);
        assert_eq!(record.completion_tokens, 4);
        assert_eq!(record.total_tokens, 28);
        assert_eq!(record.cached_tokens, 3);
        assert_eq!(record.cache_hit_tokens, 1);
        assert_eq!(record.cache_miss_tokens, 23);
        assert_eq!(record.finish_reason.as_deref(), Some("stop"));
        assert_eq!(record.logprobs, None);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let raw = sample();
        assert_eq!(
            map_response(&raw, "p").unwrap(),
            map_response(&raw, "p").unwrap()
        );
    }

    #[test]
    fn test_uses_first_choice_only() {
        let mut raw = sample();
        raw["choices"]
            .as_array_mut()
            .unwrap()
            .push(json!({"message": {"content": "second"}, "finish_reason": "length"}));

        let record = map_response(&raw, "p").unwrap();
        assert_eq!(record.completion, "Brasília.");
        assert_eq!(record.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let mut raw = sample();
        raw["choices"] = json!([]);

        let err = map_response(&raw, "p").unwrap_err();
        assert!(matches!(err, PersistError::MalformedResponse(ref msg) if msg.contains("choices")));
    }

    #[test]
    fn test_missing_usage_is_malformed() {
        let mut raw = sample();
        raw.as_object_mut().unwrap().remove("usage");

        let err = map_response(&raw, "p").unwrap_err();
        assert!(matches!(err, PersistError::MalformedResponse(ref msg) if msg.contains("usage")));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let mut raw = sample();
        raw["usage"]["total_tokens"] = json!("twenty-eight");

        assert!(matches!(
            map_response(&raw, "p"),
            Err(PersistError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_null_content_is_malformed() {
        let mut raw = sample();
        raw["choices"][0]["message"]["content"] = Value::Null;

        assert!(matches!(
            map_response(&raw, "p"),
            Err(PersistError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_cache_counters_default_to_zero() {
        let raw = json!({
            "id": "chatcmpl-1",
            "created": 1700000000,
            "model": "gpt-4o-mini",
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
        });

        let record = map_response(&raw, "p").unwrap();
        assert_eq!(record.system_fingerprint, None);
        assert_eq!(record.finish_reason, None);
        assert_eq!(record.cached_tokens, 0);
        assert_eq!(record.cache_hit_tokens, 0);
        assert_eq!(record.cache_miss_tokens, 0);
    }

    #[test]
    fn test_logprobs_kept_when_present() {
        let mut raw = sample();
        raw["choices"][0]["logprobs"] = json!({"content": [{"token": "Bras", "logprob": -0.1}]});

        let record = ResponseMapper::new().map(&raw, "p").unwrap();
        assert_eq!(
            record.logprobs,
            Some(json!({"content": [{"token": "Bras", "logprob": -0.1}]}))
        );
    }
}
