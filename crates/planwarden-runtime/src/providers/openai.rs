//! OpenAI-compatible chat-completions provider.
//!
//! OpenAI, Groq and Gemini all accept the `/chat/completions` wire format,
//! so one adapter serves all three. An [`OpenAiPreset`] carries the
//! per-vendor base URL, key variable and default model.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Vendor presets for the OpenAI-compatible adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiPreset {
    OpenAi,
    Groq,
    Gemini,
}

impl OpenAiPreset {
    pub const ALL: [OpenAiPreset; 3] = [OpenAiPreset::OpenAi, OpenAiPreset::Groq, OpenAiPreset::Gemini];

    /// Provider type used in config and on the command line.
    pub fn provider_type(&self) -> &'static str {
        match self {
            OpenAiPreset::OpenAi => "openai",
            OpenAiPreset::Groq => "groq",
            OpenAiPreset::Gemini => "gemini",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            OpenAiPreset::OpenAi => "https://api.openai.com/v1",
            OpenAiPreset::Groq => "https://api.groq.com/openai/v1",
            OpenAiPreset::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            OpenAiPreset::OpenAi => "OPENAI_API_KEY",
            OpenAiPreset::Groq => "GROQ_API_KEY",
            OpenAiPreset::Gemini => "GOOGLE_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            OpenAiPreset::OpenAi => "gpt-4o",
            OpenAiPreset::Groq => "llama3-70b-8192",
            OpenAiPreset::Gemini => "gemini-1.5-pro",
        }
    }

    fn credential_name(&self) -> &'static str {
        match self {
            OpenAiPreset::OpenAi => "OpenAI API key",
            OpenAiPreset::Groq => "Groq API key",
            OpenAiPreset::Gemini => "Google API key",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            OpenAiPreset::OpenAi => "OpenAI chat completions",
            OpenAiPreset::Groq => "Groq (OpenAI-compatible endpoint)",
            OpenAiPreset::Gemini => "Google Gemini (OpenAI-compatible endpoint)",
        }
    }
}

/// Provider speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleProvider {
    preset: OpenAiPreset,
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("preset", &self.preset)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiCompatibleProvider {
    pub fn new(preset: OpenAiPreset, api_key: impl Into<String>) -> Self {
        Self {
            preset,
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                preset.credential_name(),
            ),
            base_url: preset.base_url().to_string(),
        }
    }

    /// Create from a provider config section, falling back to the preset's
    /// environment variable.
    pub fn from_config(preset: OpenAiPreset, config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            preset.api_key_env(),
            preset.credential_name(),
        )?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(preset.base_url())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            preset,
            credential,
            base_url,
        })
    }

}

#[cfg(feature = "openai")]
mod wire {
    use serde::{Deserialize, Serialize};

    use crate::providers::ChatMessage;

    #[derive(Debug, Serialize)]
    pub(super) struct ChatRequest<'a> {
        pub model: &'a str,
        pub messages: &'a [ChatMessage],
        pub max_tokens: u32,
        pub temperature: f32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub response_format: Option<ResponseFormat>,
    }

    #[derive(Debug, Serialize)]
    pub(super) struct ResponseFormat {
        #[serde(rename = "type")]
        pub type_: &'static str,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ChatResponse {
        pub model: String,
        pub choices: Vec<Choice>,
        #[serde(default)]
        pub usage: Option<Usage>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Choice {
        pub message: ChoiceMessage,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ChoiceMessage {
        #[serde(default)]
        pub content: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Usage {
        #[serde(default)]
        pub prompt_tokens: u32,
        #[serde(default)]
        pub completion_tokens: u32,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ErrorBody {
        pub error: ErrorDetail,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct ErrorDetail {
        pub message: String,
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    #[cfg(feature = "openai")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        use super::TokenUsage;
        use wire::*;

        let client = super::http_client(config.timeout)?;

        let request = ChatRequest {
            model: &config.model,
            messages: &messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            response_format: config.json_mode.then_some(ResponseFormat {
                type_: "json_object",
            }),
        };

        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
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
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                ..TokenUsage::default()
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: body.model,
            stop_reason: choice.finish_reason,
        })
    }

    #[cfg(not(feature = "openai"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "{} provider requires 'openai' feature",
            self.preset.provider_type()
        )))
    }

    fn name(&self) -> &str {
        self.preset.provider_type()
    }

    fn default_model(&self) -> &str {
        self.preset.default_model()
    }
}

/// Factory for one [`OpenAiPreset`].
///
/// ```json
/// {
///   "api_key": "...",           // optional, falls back to the preset's env var
///   "base_url": "https://...",  // optional
///   "model": "gpt-4o"
/// }
/// ```
pub struct OpenAiCompatibleFactory {
    preset: OpenAiPreset,
}

impl OpenAiCompatibleFactory {
    pub fn new(preset: OpenAiPreset) -> Self {
        Self { preset }
    }
}

impl ProviderFactory for OpenAiCompatibleFactory {
    fn provider_type(&self) -> &'static str {
        self.preset.provider_type()
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OpenAiCompatibleProvider::from_config(
            self.preset,
            config,
        )?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        let env_var = self.preset.api_key_env();
        if !ApiCredential::is_available(config, "api_key", env_var) {
            return Err(ProviderError::NotConfigured(format!(
                "{} required: set 'api_key' in config or {} env",
                self.preset.credential_name(),
                env_var
            )));
        }
        super::validate_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": self.preset.default_model(),
            "base_url": self.preset.base_url()
        })
    }

    fn description(&self) -> &'static str {
        self.preset.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_distinct() {
        let types: Vec<_> = OpenAiPreset::ALL.iter().map(|p| p.provider_type()).collect();
        assert_eq!(types, vec!["openai", "groq", "gemini"]);

        assert_eq!(OpenAiPreset::Groq.api_key_env(), "GROQ_API_KEY");
        assert_eq!(OpenAiPreset::Gemini.api_key_env(), "GOOGLE_API_KEY");
        assert_eq!(OpenAiPreset::OpenAi.default_model(), "gpt-4o");
    }

    #[test]
    fn test_provider_name_follows_preset() {
        let provider = OpenAiCompatibleProvider::new(OpenAiPreset::Groq, "gsk-key");
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.default_model(), "llama3-70b-8192");
        assert_eq!(provider.base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_factory_create_with_config_key() {
        let factory = OpenAiCompatibleFactory::new(OpenAiPreset::Gemini);
        let provider = factory
            .create(&serde_json::json!({"api_key": "g-key"}))
            .unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_factory_rejects_bad_base_url() {
        let factory = OpenAiCompatibleFactory::new(OpenAiPreset::OpenAi);
        let config = serde_json::json!({"api_key": "k", "base_url": "ftp://nope"});
        assert!(factory.validate_config(&config).is_err());
    }

    #[test]
    fn test_custom_base_url() {
        let provider = OpenAiCompatibleProvider::from_config(
            OpenAiPreset::OpenAi,
            &serde_json::json!({"api_key": "k", "base_url": "http://localhost:8080/v1/"}),
        )
        .unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret = "sk-openai-secret-999";
        let provider = OpenAiCompatibleProvider::new(OpenAiPreset::OpenAi, secret);
        let debug = format!("{:?}", provider);
        assert!(!debug.contains(secret));
        assert!(debug.contains("[REDACTED]"));
    }

    #[cfg(not(feature = "openai"))]
    #[tokio::test]
    async fn test_complete_without_feature_is_not_configured() {
        let provider = OpenAiCompatibleProvider::new(OpenAiPreset::Groq, "gsk-key");
        let err = provider
            .complete(vec![ChatMessage::user("hi")], &CompletionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
