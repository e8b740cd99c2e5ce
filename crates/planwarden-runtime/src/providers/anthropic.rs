//! Anthropic Claude provider (Messages API).
//!
//! The API key lives in an [`ApiCredential`]; see the
//! [`secrets`](super::secrets) module.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250514";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Anthropic API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from a provider config section, falling back to `ANTHROPIC_API_KEY`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            credential,
            base_url,
        })
    }
}

#[cfg(feature = "anthropic")]
mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize)]
    pub(super) struct AnthropicRequest {
        pub model: String,
        pub max_tokens: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub system: Option<Vec<ContentBlock>>,
        pub messages: Vec<AnthropicMessage>,
        pub temperature: f32,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct AnthropicMessage {
        pub role: String,
        pub content: Vec<ContentBlock>,
    }

    #[derive(Debug, Serialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub(super) enum ContentBlock {
        Text {
            text: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            cache_control: Option<CacheControl>,
        },
    }

    #[derive(Debug, Serialize)]
    pub(super) struct CacheControl {
        #[serde(rename = "type")]
        pub type_: String,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicResponse {
        pub content: Vec<ContentBlockResponse>,
        pub model: String,
        pub stop_reason: Option<String>,
        pub usage: AnthropicUsage,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ContentBlockResponse {
        pub text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicUsage {
        pub input_tokens: u32,
        pub output_tokens: u32,
        #[serde(default)]
        pub cache_creation_input_tokens: u32,
        #[serde(default)]
        pub cache_read_input_tokens: u32,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicError {
        pub error: AnthropicErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct AnthropicErrorDetail {
        pub message: String,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    #[cfg(feature = "anthropic")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        use super::TokenUsage;
        use wire::*;

        let client = super::http_client(config.timeout)?;

        let cache_control = || {
            config.prompt_caching.then(|| CacheControl {
                type_: "ephemeral".to_string(),
            })
        };

        // Only the system prompt carries cache_control.
        let mut system = None;
        let mut api_messages = Vec::new();
        for msg in messages {
            if msg.role == "system" {
                system = Some(vec![ContentBlock::Text {
                    text: msg.content,
                    cache_control: cache_control(),
                }]);
            } else {
                api_messages.push(AnthropicMessage {
                    role: msg.role,
                    content: vec![ContentBlock::Text {
                        text: msg.content,
                        cache_control: None,
                    }],
                });
            }
        }

        let request = AnthropicRequest {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system,
            messages: api_messages,
            temperature: config.temperature,
        };

        // SECURITY: Only expose the credential here, at the point of use
        let response = client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| super::transport_error(e, config.timeout))?;

        let status = response.status();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after: super::retry_after(response.headers()),
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = match response.json::<AnthropicError>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
                cache_creation_tokens: body.usage.cache_creation_input_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    #[cfg(not(feature = "anthropic"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Anthropic provider requires 'anthropic' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }
}

/// Factory for [`AnthropicProvider`].
///
/// ```json
/// {
///   "api_key": "sk-ant-...",      // optional, falls back to ANTHROPIC_API_KEY
///   "base_url": "https://...",    // optional
///   "model": "claude-sonnet-4-5-20250514"
/// }
/// ```
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        super::validate_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": DEFAULT_MODEL,
            "prompt_caching": true
        })
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude (Messages API, prompt caching)"
    }
}
