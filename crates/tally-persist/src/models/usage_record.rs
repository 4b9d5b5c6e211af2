use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::UsageRow;
use crate::error::{PersistError, Result};

/// Stored timestamps are rendered at UTC-3 (America/Sao_Paulo, no DST)
pub const STORAGE_UTC_OFFSET_WEST_SECS: i32 = 3 * 3600;

const STORAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// One completed API call, ready to be persisted
///
/// Built once by the response mapper and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub usage_id: String,
    /// Unix epoch seconds reported by the remote service
    pub created: i64,
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
    pub logprobs: Option<Value>,
}

impl UsageRecord {
    /// Storage form of this record: formatted timestamp, logprobs as text
    pub fn to_row(&self) -> Result<UsageRow> {
        let created_at =
            format_timestamp(self.created).ok_or(PersistError::InvalidTimestamp(self.created))?;

        Ok(UsageRow {
            usage_id: self.usage_id.clone(),
            created_at,
            model: self.model.clone(),
            system_fingerprint: self.system_fingerprint.clone(),
            prompt: self.prompt.clone(),
            completion: self.completion.clone(),
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            cached_tokens: self.cached_tokens,
            cache_hit_tokens: self.cache_hit_tokens,
            cache_miss_tokens: self.cache_miss_tokens,
            finish_reason: self.finish_reason.clone(),
            logprobs: self.logprobs.as_ref().map(Value::to_string),
        })
    }
}

/// Render epoch seconds in the storage timezone, `None` when out of range
pub fn format_timestamp(epoch_secs: i64) -> Option<String> {
    let offset = FixedOffset::west_opt(STORAGE_UTC_OFFSET_WEST_SECS)?;
    let utc = DateTime::from_timestamp(epoch_secs, 0)?;
    Some(
        utc.with_timezone(&offset)
            .format(STORAGE_TIMESTAMP_FORMAT)
            .to_string(),
    )
}
