//! Comparison engine: one judgment call, then the deterministic gates.
//!
//! The engine asks its [`JudgmentCapability`] exactly once per run, under a
//! timeout, and never retries. Whatever comes back is validated and
//! cascade-enforced by [`planwarden_core::judge_payload`]; the capability
//! cannot bypass either step.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use planwarden_core::{
    judge_payload, AnalysisResult, EvidenceItem, JudgmentRequest, MalformedJudgment, PlanStep,
};

use crate::judge::{JudgmentCapability, JudgmentError};
use crate::providers::TokenUsage;

/// Default wall-clock limit for the judgment call.
pub const DEFAULT_JUDGMENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from the comparison stage.
#[derive(Error, Debug)]
pub enum ComparisonError {
    #[error("Judgment unavailable: {0}")]
    JudgmentUnavailable(String),

    #[error("Malformed judgment: {0}")]
    MalformedJudgment(#[from] MalformedJudgment),
}

/// Result of one comparison.
#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    pub analysis: AnalysisResult,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub elapsed: Duration,
}

/// Compares an ordered plan against an ordered evidence transcript.
#[derive(Clone)]
pub struct ComparisonEngine {
    capability: Arc<dyn JudgmentCapability>,
    timeout: Duration,
}

impl std::fmt::Debug for ComparisonEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonEngine")
            .field("capability", &self.capability.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ComparisonEngine {
    pub fn new(capability: Arc<dyn JudgmentCapability>) -> Self {
        Self {
            capability,
            timeout: DEFAULT_JUDGMENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn capability_name(&self) -> &str {
        self.capability.name()
    }

    /// Judge every plan step against the whole transcript.
    ///
    /// The returned result has one verdict per plan step, in plan order,
    /// with the cascading skip applied.
    pub async fn compare(
        &self,
        plan: &[PlanStep],
        evidence: &[EvidenceItem],
    ) -> Result<ComparisonOutcome, ComparisonError> {
        let request = JudgmentRequest::new(plan, evidence);
        let started = Instant::now();

        let response = match tokio::time::timeout(self.timeout, self.capability.judge(&request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(JudgmentError::Malformed(reason))) => {
                return Err(MalformedJudgment::Unparsable(reason).into());
            }
            Ok(Err(err)) => {
                warn!(capability = self.capability.name(), error = %err, "Judgment call failed");
                return Err(ComparisonError::JudgmentUnavailable(err.to_string()));
            }
            Err(_) => {
                warn!(
                    capability = self.capability.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Judgment call timed out"
                );
                return Err(ComparisonError::JudgmentUnavailable(format!(
                    "no response within {:?}",
                    self.timeout
                )));
            }
        };
        let elapsed = started.elapsed();

        let analysis = judge_payload(&response.payload, &request)?;

        info!(
            capability = self.capability.name(),
            model = response.model.as_deref().unwrap_or("-"),
            steps = analysis.len(),
            first_deviation = analysis.first_deviation(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Comparison complete"
        );

        Ok(ComparisonOutcome {
            analysis,
            model: response.model,
            usage: response.usage,
            elapsed,
        })
    }
}
