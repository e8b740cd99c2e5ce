//! Audit orchestrator: Ingest → Split → Compare → Render.
//!
//! Each stage consumes only the previous stage's artifact. The first
//! failure ends the run; nothing after it executes and no report is
//! produced. A successful run yields exactly one [`Report`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

use planwarden_core::{
    AnalysisResult, EmptyPlanError, EvidenceItem, IngestError, LogIngestor, MalformedJudgment,
    PlanEvidenceSplitter, PlanStep, RenderError, Report, ReportRenderer, RoleRules, SplitLog,
};

use crate::config::RuntimeConfig;
use crate::engine::{ComparisonEngine, ComparisonError, DEFAULT_JUDGMENT_TIMEOUT};
use crate::judge::{JudgmentCapability, LlmJudge};
use crate::providers::{ProviderError, ProviderRegistry, TokenUsage};

/// Pipeline stage, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Split,
    Compare,
    Render,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Ingest => "ingest",
            Stage::Split => "split",
            Stage::Compare => "compare",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// Errors from an audit run. Every variant is fatal.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Log could not be ingested: {0}")]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    EmptyPlan(#[from] EmptyPlanError),

    #[error("Judgment unavailable: {0}")]
    JudgmentUnavailable(String),

    #[error("Malformed judgment: {0}")]
    MalformedJudgment(MalformedJudgment),

    #[error("Report could not be rendered: {0}")]
    Render(#[from] RenderError),
}

impl AuditError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            AuditError::Ingest(_) => Stage::Ingest,
            AuditError::EmptyPlan(_) => Stage::Split,
            AuditError::JudgmentUnavailable(_) | AuditError::MalformedJudgment(_) => Stage::Compare,
            AuditError::Render(_) => Stage::Render,
        }
    }
}

impl From<ComparisonError> for AuditError {
    fn from(err: ComparisonError) -> Self {
        match err {
            ComparisonError::JudgmentUnavailable(reason) => AuditError::JudgmentUnavailable(reason),
            ComparisonError::MalformedJudgment(malformed) => AuditError::MalformedJudgment(malformed),
        }
    }
}

/// Errors from assembling an [`Auditor`].
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("No judgment capability configured")]
    MissingCapability,

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AuditOutcome {
    pub plan: Vec<PlanStep>,
    pub evidence: Vec<EvidenceItem>,
    pub analysis: AnalysisResult,
    pub report: Report,

    /// Capability that produced the verdicts.
    pub capability: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    pub audited_at: DateTime<Utc>,

    pub elapsed_ms: u64,
}

impl AuditOutcome {
    pub fn has_deviation(&self) -> bool {
        self.analysis.first_deviation().is_some()
    }
}

/// Runs audits. `Send + Sync`; share one across runs with `Arc`.
#[derive(Debug, Clone)]
pub struct Auditor {
    ingestor: LogIngestor,
    engine: ComparisonEngine,
    renderer: ReportRenderer,
}

impl Auditor {
    pub fn builder() -> AuditorBuilder {
        AuditorBuilder::new()
    }

    /// Assemble an auditor from configuration, creating the provider
    /// through `registry`.
    pub fn from_config(config: &RuntimeConfig, registry: &ProviderRegistry) -> Result<Self, SetupError> {
        let provider = registry.create(
            &config.provider.provider_type,
            &config.provider.factory_config(),
        )?;

        let judge = LlmJudge::new(provider)
            .with_completion(config.completion())
            .with_retry(config.judgment.retry)
            .with_evidence_char_limit(config.judgment.evidence_char_limit);

        info!(
            provider = %config.provider.provider_type,
            model = %judge.completion().model,
            timeout_ms = config.judgment.timeout.as_millis() as u64,
            "Auditor configured"
        );

        AuditorBuilder::new()
            .config(config)
            .capability(Arc::new(judge))
            .build()
    }

    /// Run Ingest and Split only.
    pub fn inspect(&self, document: &str) -> Result<SplitLog, AuditError> {
        let entries = self.ingestor.ingest(document)?;
        debug!(stage = %Stage::Ingest, entries = entries.len(), "Log ingested");

        let split = PlanEvidenceSplitter::split(&entries)?;
        debug!(
            stage = %Stage::Split,
            steps = split.plan.len(),
            evidence = split.evidence.len(),
            "Plan and evidence separated"
        );
        Ok(split)
    }

    /// Audit one execution log.
    pub async fn audit(&self, document: &str) -> Result<AuditOutcome, AuditError> {
        let started = Instant::now();

        let SplitLog { plan, evidence } = self.inspect(document)?;
        info!(
            steps = plan.len(),
            evidence = evidence.len(),
            capability = self.engine.capability_name(),
            "Comparing plan against evidence"
        );

        let comparison = self.engine.compare(&plan, &evidence).await?;

        let report = self.renderer.render(&plan, &comparison.analysis)?;
        let summary = report.summary();
        info!(
            stage = %Stage::Render,
            observed = summary.observed,
            deviation = summary.deviation,
            skipped = summary.skipped,
            "Report rendered"
        );

        Ok(AuditOutcome {
            plan,
            evidence,
            analysis: comparison.analysis,
            report,
            capability: self.engine.capability_name().to_string(),
            model: comparison.model,
            usage: comparison.usage,
            audited_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

/// Builder for [`Auditor`].
pub struct AuditorBuilder {
    capability: Option<Arc<dyn JudgmentCapability>>,
    timeout: Duration,
    rules: RoleRules,
    title: Option<String>,
}

impl AuditorBuilder {
    pub fn new() -> Self {
        Self {
            capability: None,
            timeout: DEFAULT_JUDGMENT_TIMEOUT,
            rules: RoleRules::default(),
            title: None,
        }
    }

    /// Take timeout, role rules and report title from `config`.
    pub fn config(mut self, config: &RuntimeConfig) -> Self {
        self.timeout = config.judgment.timeout;
        self.rules = config.ingest.clone();
        self.title = Some(config.report.title.clone());
        self
    }

    pub fn capability(mut self, capability: Arc<dyn JudgmentCapability>) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn rules(mut self, rules: RoleRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn build(self) -> Result<Auditor, SetupError> {
        let capability = self.capability.ok_or(SetupError::MissingCapability)?;

        let renderer = match self.title {
            Some(title) => ReportRenderer::with_title(title),
            None => ReportRenderer::new(),
        };

        Ok(Auditor {
            ingestor: LogIngestor::with_rules(self.rules),
            engine: ComparisonEngine::new(capability).with_timeout(self.timeout),
            renderer,
        })
    }
}

impl Default for AuditorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
