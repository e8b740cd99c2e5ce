//! Judgment capability trait and its LLM-backed implementation.
//!
//! The comparison engine only knows [`JudgmentCapability`]. [`LlmJudge`]
//! adapts any [`LlmProvider`] to it: it builds the prompts, retries
//! transient transport failures and hands back the parsed JSON payload.
//! It does not interpret the verdicts; that is the engine's job.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use planwarden_core::JudgmentRequest;

use crate::prompts::{build_user_prompt, DEFAULT_EVIDENCE_CHAR_LIMIT, JUDGMENT_SYSTEM_PROMPT};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError, TokenUsage};

lazy_static! {
    // ```json ... ``` around the whole reply
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").unwrap();
}

/// Errors from a judgment capability.
#[derive(Error, Debug)]
pub enum JudgmentError {
    #[error("Judgment capability unavailable: {0}")]
    Unavailable(String),

    #[error("Judgment timed out after {0:?}")]
    Timeout(Duration),

    #[error("Judgment response is not JSON: {0}")]
    Malformed(String),
}

impl From<ProviderError> for JudgmentError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(after) => JudgmentError::Timeout(after),
            other => JudgmentError::Unavailable(other.to_string()),
        }
    }
}

/// Raw answer from a judgment capability.
#[derive(Debug, Clone)]
pub struct JudgmentResponse {
    /// Proposed verdicts, not yet validated.
    pub payload: JsonValue,

    /// Model that produced the payload, if any.
    pub model: Option<String>,

    /// Token usage, if the capability reports it.
    pub usage: Option<TokenUsage>,
}

impl JudgmentResponse {
    pub fn new(payload: JsonValue) -> Self {
        Self {
            payload,
            model: None,
            usage: None,
        }
    }
}

/// One external call that judges a whole plan against a whole transcript.
///
/// Implementations receive every plan step and every evidence item at
/// once and return one proposed verdict per step. The engine calls
/// [`judge`](JudgmentCapability::judge) exactly once per run.
#[async_trait]
pub trait JudgmentCapability: Send + Sync {
    async fn judge(&self, request: &JudgmentRequest) -> Result<JudgmentResponse, JudgmentError>;

    /// Name for logs.
    fn name(&self) -> &str;
}

/// Transport retry policy for [`LlmJudge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retry.
    pub max_attempts: usize,

    /// Delay before the first retry; doubles after each attempt.
    #[serde(with = "crate::config::duration_text")]
    pub min_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            min_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            min_delay: Duration::ZERO,
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }
}

/// [`JudgmentCapability`] backed by an [`LlmProvider`].
pub struct LlmJudge {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    retry: RetryPolicy,
    evidence_char_limit: usize,
}

impl std::fmt::Debug for LlmJudge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmJudge")
            .field("provider", &self.provider.name())
            .field("model", &self.completion.model)
            .field("retry", &self.retry)
            .finish()
    }
}

impl LlmJudge {
    /// Create a judge using the provider's default model.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let completion = CompletionConfig {
            model: provider.default_model().to_string(),
            ..CompletionConfig::default()
        };
        Self {
            provider,
            completion,
            retry: RetryPolicy::default(),
            evidence_char_limit: DEFAULT_EVIDENCE_CHAR_LIMIT,
        }
    }

    /// Replace the completion settings. An empty model falls back to the
    /// provider's default.
    pub fn with_completion(mut self, mut completion: CompletionConfig) -> Self {
        if completion.model.trim().is_empty() {
            completion.model = self.provider.default_model().to_string();
        }
        self.completion = completion;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_evidence_char_limit(mut self, limit: usize) -> Self {
        self.evidence_char_limit = limit;
        self
    }

    pub fn completion(&self) -> &CompletionConfig {
        &self.completion
    }

    fn messages(&self, request: &JudgmentRequest) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(JUDGMENT_SYSTEM_PROMPT.trim()),
            ChatMessage::user(build_user_prompt(request, self.evidence_char_limit)),
        ]
    }
}

#[async_trait]
impl JudgmentCapability for LlmJudge {
    async fn judge(&self, request: &JudgmentRequest) -> Result<JudgmentResponse, JudgmentError> {
        let messages = self.messages(request);
        debug!(
            provider = self.provider.name(),
            model = %self.completion.model,
            prompt_tokens_estimate = messages
                .iter()
                .map(|m| self.provider.estimate_tokens(&m.content))
                .sum::<u32>(),
            "Requesting judgment"
        );

        let provider = &self.provider;
        let completion = &self.completion;
        let messages = &messages;
        let response = (|| async move { provider.complete(messages.clone(), completion).await })
            .retry(self.retry.backoff())
            .when(|e: &ProviderError| e.is_transient())
            .notify(|err: &ProviderError, delay: Duration| {
                warn!(
                    provider = provider.name(),
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Transient provider error, retrying"
                );
            })
            .await?;

        let payload = parse_json_reply(&response.content)?;

        Ok(JudgmentResponse {
            payload,
            model: Some(response.model),
            usage: Some(response.usage),
        })
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}

/// Parse a model reply as JSON, tolerating a surrounding code fence.
pub fn parse_json_reply(content: &str) -> Result<JsonValue, JudgmentError> {
    let trimmed = content.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    serde_json::from_str(body).map_err(|e| JudgmentError::Malformed(e.to_string()))
}
