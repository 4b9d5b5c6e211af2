use tally_llm::LlmError;
use tally_persist::PersistError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration error: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub type CliResult<T> = Result<T, CliError>;
