use config::{Config as ConfigLoader, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CliError;

pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub default_provider: String,
    pub providers: BTreeMap<String, ProviderSettings>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One named provider profile as written in the settings file
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub system_content: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

/// A resolved provider profile, ready to build a request from
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub provider: String,
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub system_content: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("api_usages.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: tally_llm::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. the YAML settings file at `path`
    /// 2. Environment variables prefixed with `TALLY_`, nested keys split by `__`
    ///    (e.g. `TALLY_STORAGE__PATH`, `TALLY_HTTP__TIMEOUT_SECS`)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CliError::Config(format!(
                "settings file not found: {}",
                path.display()
            )));
        }

        let builder = ConfigLoader::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix("TALLY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from YAML text (useful for testing)
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CliError> {
        let settings: Settings = ConfigLoader::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), CliError> {
        if self.http.timeout_secs == 0 {
            return Err(CliError::Config(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }
        for (name, provider) in &self.providers {
            provider.validate(name)?;
        }
        Ok(())
    }

    /// Resolve a provider profile by name, falling back to `default_provider`
    pub fn profile(&self, name: Option<&str>) -> Result<ProviderProfile, CliError> {
        // Keys are case-insensitive once loaded
        let name = name.unwrap_or(&self.default_provider).to_lowercase();
        let provider = self.providers.get(&name).ok_or_else(|| {
            CliError::Config(format!(
                "provider '{}' not found (available: {})",
                name,
                self.providers.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })?;

        Ok(ProviderProfile {
            provider: name,
            model: provider.model.clone(),
            api_url: provider.api_url.clone(),
            max_tokens: provider.max_tokens,
            temperature: provider.temperature,
            top_p: provider.top_p,
            system_content: provider.system_content.clone(),
            api_key_env: provider.api_key_env.clone(),
        })
    }
}

impl ProviderSettings {
    fn validate(&self, name: &str) -> Result<(), CliError> {
        let invalid = |msg: &str| CliError::Config(format!("provider '{}': {}", name, msg));

        if self.model.trim().is_empty() {
            return Err(invalid("model must not be empty"));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(invalid("api_url must be an http(s) URL"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature must be between 0 and 2"));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(invalid("top_p must be between 0 and 1"));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(invalid("api_key_env must name an environment variable"));
        }
        Ok(())
    }
}

impl ProviderProfile {
    /// Read the API key from the environment variable named by the profile
    pub fn resolve_api_key(&self) -> Result<SecretString, CliError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(SecretString::from(key)),
            _ => Err(CliError::MissingApiKey(self.api_key_env.clone())),
        }
    }
}
