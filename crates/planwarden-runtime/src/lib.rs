//! # planwarden-runtime
//!
//! The asynchronous half of planwarden: the judgment capability, the
//! comparison engine and the audit orchestrator.
//!
//! `planwarden-core` does everything that can be done without a model.
//! This crate adds the one step that needs one: a single call that judges
//! the whole plan against the whole evidence transcript. The answer from
//! that call goes straight back through the core's validation and
//! cascade rules, so a model can propose verdicts but never bypass them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use planwarden_runtime::{Auditor, ProviderRegistry, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("planwarden.yaml")?;
//! let auditor = Auditor::from_config(&config, &ProviderRegistry::with_defaults())?;
//!
//! let outcome = auditor.audit(&std::fs::read_to_string("agent_inner_logs.json")?).await?;
//! println!("{}", outcome.report.to_markdown());
//! ```
//!
//! Custom backends implement [`JudgmentCapability`] directly and are
//! passed to [`AuditorBuilder::capability`].

pub mod config;
pub mod engine;
pub mod judge;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use config::{ConfigError, JudgmentSettings, ProviderSection, ReportSettings, RuntimeConfig};
pub use engine::{ComparisonEngine, ComparisonError, ComparisonOutcome, DEFAULT_JUDGMENT_TIMEOUT};
pub use judge::{
    parse_json_reply, JudgmentCapability, JudgmentError, JudgmentResponse, LlmJudge, RetryPolicy,
};
pub use orchestrator::{AuditError, AuditOutcome, Auditor, AuditorBuilder, SetupError, Stage};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderFactory, ProviderRegistry, TokenUsage,
};
