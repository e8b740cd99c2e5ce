//! Runtime configuration.
//!
//! Loaded from YAML or JSON. Every section and field is optional; missing
//! values take the defaults below.
//!
//! ```yaml
//! provider:
//!   type: groq
//!   model: openai/gpt-oss-120b
//! judgment:
//!   timeout: 90s
//!   retry:
//!     max_attempts: 3
//!     min_delay: 2s
//! report:
//!   title: Checkout flow audit
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use planwarden_core::report::DEFAULT_TITLE;
use planwarden_core::RoleRules;

use crate::engine::DEFAULT_JUDGMENT_TIMEOUT;
use crate::judge::RetryPolicy;
use crate::prompts::DEFAULT_EVIDENCE_CHAR_LIMIT;
use crate::providers::CompletionConfig;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderSection,
    pub judgment: JudgmentSettings,
    pub ingest: RoleRules,
    pub report: ReportSettings,
}

/// Which provider to use and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Registered provider type (`anthropic`, `openai`, `groq`, `gemini`).
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Model name; empty means the provider's default.
    pub model: Option<String>,

    /// API key; when absent the provider's environment variable is used.
    pub api_key: Option<String>,

    pub base_url: Option<String>,

    /// Anthropic prompt caching.
    pub prompt_caching: bool,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            provider_type: "openai".to_string(),
            model: None,
            api_key: None,
            base_url: None,
            prompt_caching: true,
        }
    }
}

impl ProviderSection {
    /// JSON section handed to the provider factory.
    pub fn factory_config(&self) -> JsonValue {
        let mut config = serde_json::Map::new();
        if let Some(model) = &self.model {
            config.insert("model".into(), JsonValue::String(model.clone()));
        }
        if let Some(key) = &self.api_key {
            config.insert("api_key".into(), JsonValue::String(key.clone()));
        }
        if let Some(url) = &self.base_url {
            config.insert("base_url".into(), JsonValue::String(url.clone()));
        }
        config.insert("prompt_caching".into(), JsonValue::Bool(self.prompt_caching));
        JsonValue::Object(config)
    }
}

/// Settings for the judgment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgmentSettings {
    /// Wall-clock limit for the whole judgment call, retries included.
    #[serde(with = "duration_text")]
    pub timeout: Duration,

    pub max_tokens: u32,

    pub temperature: f32,

    /// Per-item cap on evidence text sent to the model.
    pub evidence_char_limit: usize,

    pub retry: RetryPolicy,
}

impl Default for JudgmentSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_JUDGMENT_TIMEOUT,
            max_tokens: 4096,
            temperature: 0.0,
            evidence_char_limit: DEFAULT_EVIDENCE_CHAR_LIMIT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub title: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes as null.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.provider_type.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.type must not be empty".into()));
        }
        if self.judgment.timeout.is_zero() {
            return Err(ConfigError::Invalid("judgment.timeout must be positive".into()));
        }
        if self.judgment.max_tokens == 0 {
            return Err(ConfigError::Invalid("judgment.max_tokens must be positive".into()));
        }
        if self.judgment.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "judgment.retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.judgment.evidence_char_limit == 0 {
            return Err(ConfigError::Invalid(
                "judgment.evidence_char_limit must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Completion settings for the judgment call.
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.provider.model.clone().unwrap_or_default(),
            max_tokens: self.judgment.max_tokens,
            temperature: self.judgment.temperature,
            timeout: self.judgment.timeout,
            prompt_caching: self.provider.prompt_caching,
            json_mode: true,
        }
    }
}

/// Serde helper: durations as humantime text (`"90s"`, `"2m"`), also
/// accepting a bare number of seconds.
pub(crate) mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Repr::Text(text) => {
                humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
            }
        }
    }
}
