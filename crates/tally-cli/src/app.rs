//! One prompt in, one response displayed, one usage row stored.

use serde_json::Value;
use std::time::Duration;
use tally_llm::{ChatClient, ChatOptions, ChatRequest, ClientConfig, LlmError, OpenAICompatibleClient};
use tally_persist::{PersistError, ResponseMapper, UsageRecord, UsageStore};

use crate::config::ProviderProfile;
use crate::error::CliResult;
use crate::report;

pub const DEFAULT_PROMPT: &str = "What is the capital of Brazil?";

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Append the full JSON response after the summary
    pub show_raw: bool,
    /// Separator width, 0 for the terminal width
    pub width: usize,
}

/// Outcome of a run that reached the remote service
#[derive(Debug)]
pub struct RunReport {
    pub display: String,
    pub raw: Value,
    pub record: Option<UsageRecord>,
    pub persist_error: Option<PersistError>,
}

pub fn build_request(profile: &ProviderProfile, prompt: &str) -> ChatRequest {
    ChatRequest::from_prompt(&profile.model, &profile.system_content, prompt).with_options(
        ChatOptions::new()
            .temperature(profile.temperature)
            .max_tokens(profile.max_tokens)
            .top_p(profile.top_p),
    )
}

/// Client for `profile`, keyed from the environment variable it names
pub fn build_client(profile: &ProviderProfile, timeout: Duration) -> CliResult<OpenAICompatibleClient> {
    let api_key = profile.resolve_api_key()?;
    let config = ClientConfig::new(profile.api_url.clone(), api_key).with_timeout(timeout);
    Ok(OpenAICompatibleClient::new(config)?)
}

/// Stats document, or the stored rows capped at `limit`
pub fn render_store(store: &UsageStore, stats: bool, limit: Option<usize>) -> CliResult<String> {
    if stats {
        Ok(report::render_stats(&store.stats()?))
    } else {
        Ok(report::render_table(&store.fetch_all(limit)?))
    }
}

/// Send `prompt`, render the response and try to persist its usage
///
/// Only the request itself can fail the run. Mapping and storage faults are
/// logged and carried in the report so the response is still shown.
pub async fn run(
    client: &dyn ChatClient,
    profile: &ProviderProfile,
    mapper: &ResponseMapper,
    store: Option<&mut UsageStore>,
    prompt: &str,
    options: RunOptions,
) -> Result<RunReport, LlmError> {
    let response = client.chat(build_request(profile, prompt)).await?;

    let mut display = report::format_summary(&response, prompt, options.width);
    if options.show_raw {
        display.push('\n');
        display.push_str(&report::raw_json(&response.raw, prompt));
    }

    let (record, persist_error) = match store {
        Some(store) => match persist(mapper, store, &response.raw, prompt) {
            Ok(record) => (Some(record), None),
            Err(err) => {
                tracing::warn!(error = %err, "Usage was not recorded");
                (None, Some(err))
            }
        },
        None => (None, None),
    };

    Ok(RunReport {
        display,
        raw: response.raw,
        record,
        persist_error,
    })
}

fn persist(
    mapper: &ResponseMapper,
    store: &mut UsageStore,
    raw: &Value,
    prompt: &str,
) -> Result<UsageRecord, PersistError> {
    let record = mapper.map(raw, prompt)?;
    store.insert(&record)?;
    Ok(record)
}
