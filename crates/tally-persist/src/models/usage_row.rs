use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored `api_usages` row as read back from the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRow {
    pub usage_id: String,
    pub created_at: String,
    pub model: String,
    pub system_fingerprint: Option<String>,
    pub prompt: String,
    pub completion: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cached_tokens: u64,
    pub cache_hit_tokens: u64,
    pub cache_miss_tokens: u64,
    pub finish_reason: Option<String>,
    pub logprobs: Option<String>,
}

impl UsageRow {
    /// Column headers in table order
    pub const COLUMNS: [&'static str; 14] = [
        "id",
        "created_at",
        "model",
        "system_fingerprint",
        "prompt",
        "completion",
        "prompt_tokens",
        "completion_tokens",
        "total_tokens",
        "cached_tokens",
        "cache_hit_tokens",
        "cache_miss_tokens",
        "finish_reason",
        "logprobs",
    ];

    /// Cell values in the same order as `COLUMNS`; NULL renders as empty
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.usage_id.clone(),
            self.created_at.clone(),
            self.model.clone(),
            self.system_fingerprint.clone().unwrap_or_default(),
            self.prompt.clone(),
            self.completion.clone(),
            self.prompt_tokens.to_string(),
            self.completion_tokens.to_string(),
            self.total_tokens.to_string(),
            self.cached_tokens.to_string(),
            self.cache_hit_tokens.to_string(),
            self.cache_miss_tokens.to_string(),
            self.finish_reason.clone().unwrap_or_default(),
            self.logprobs.clone().unwrap_or_default(),
        ]
    }
}

/// Aggregate usage over every stored row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub models_usage: BTreeMap<String, u64>,
}
