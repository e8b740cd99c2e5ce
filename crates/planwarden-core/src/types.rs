//! Core types for plan-vs-evidence audits.
//!
//! Every value here is created once per run and never edited afterwards;
//! each pipeline stage builds new values from the previous stage's output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a log entry came from, after role classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Planning or intention message: contributes plan steps
    Planner,
    /// Execution or observation message: contributes evidence
    Evidence,
    /// Anything else. Kept in the sequence, ignored downstream.
    Unknown,
}

/// One normalized entry of the raw log, in original document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based position in the normalized sequence
    pub ordinal: usize,

    /// Classified role
    pub source: EntrySource,

    /// Raw role discriminator as found in the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Flattened text payload
    pub text: String,
}

/// One intended action or assertion from the agent's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based, contiguous
    pub ordinal: usize,
    pub description: String,
}

/// One observed fact about what actually happened during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// 1-based, chronological
    pub ordinal: usize,
    pub description: String,
}

/// Outcome class for a single plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictKind {
    /// Evidence confirms the step happened
    Observed,
    /// Evidence contradicts the step, or does not support it
    Deviation,
    /// Not evaluated because an earlier step deviated
    Skipped,
}

impl VerdictKind {
    /// Display label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            VerdictKind::Observed => "Observed",
            VerdictKind::Deviation => "Deviation",
            VerdictKind::Skipped => "Skipped",
        }
    }

    /// Display glyph used in reports.
    pub fn glyph(&self) -> &'static str {
        match self {
            VerdictKind::Observed => "✅",
            VerdictKind::Deviation => "❌",
            VerdictKind::Skipped => "⚠️",
        }
    }

    /// Parse a verdict label, ignoring case and surrounding whitespace.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "observed" => Some(VerdictKind::Observed),
            "deviation" => Some(VerdictKind::Deviation),
            "skipped" => Some(VerdictKind::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Final verdict for one plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub step_ordinal: usize,
    pub kind: VerdictKind,
    pub note: String,

    /// Evidence ordinals cited by the judgment capability
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<usize>,
}

/// Ordered verdicts, one per plan step.
///
/// Only the comparison stage builds this (see
/// [`enforce_cascade`](crate::judgment::enforce_cascade)), so a value of
/// this type always satisfies:
/// - one verdict per plan step, aligned by ordinal
/// - nothing but `Skipped` after the first `Deviation`
/// - the first verdict is never `Skipped`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    verdicts: Vec<Verdict>,
}

impl AnalysisResult {
    pub(crate) fn new(verdicts: Vec<Verdict>) -> Self {
        Self { verdicts }
    }

    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Verdict> {
        self.verdicts.iter()
    }

    /// Ordinal of the step that tripped the cascade, if any.
    pub fn first_deviation(&self) -> Option<usize> {
        self.verdicts
            .iter()
            .find(|v| v.kind == VerdictKind::Deviation)
            .map(|v| v.step_ordinal)
    }

    /// Whether every step was observed.
    pub fn is_clean(&self) -> bool {
        self.verdicts.iter().all(|v| v.kind == VerdictKind::Observed)
    }
}

impl<'a> IntoIterator for &'a AnalysisResult {
    type Item = &'a Verdict;
    type IntoIter = std::slice::Iter<'a, Verdict>;

    fn into_iter(self) -> Self::IntoIter {
        self.verdicts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_kind_parse_is_case_insensitive() {
        assert_eq!(VerdictKind::parse("Observed"), Some(VerdictKind::Observed));
        assert_eq!(VerdictKind::parse(" DEVIATION "), Some(VerdictKind::Deviation));
        assert_eq!(VerdictKind::parse("skipped"), Some(VerdictKind::Skipped));
        assert_eq!(VerdictKind::parse("passed"), None);
    }

    #[test]
    fn test_glyphs_are_distinct() {
        let glyphs = [
            VerdictKind::Observed.glyph(),
            VerdictKind::Deviation.glyph(),
            VerdictKind::Skipped.glyph(),
        ];
        assert_ne!(glyphs[0], glyphs[1]);
        assert_ne!(glyphs[1], glyphs[2]);
        assert_ne!(glyphs[0], glyphs[2]);
    }

    #[test]
    fn test_first_deviation() {
        let result = AnalysisResult::new(vec![
            Verdict {
                step_ordinal: 1,
                kind: VerdictKind::Observed,
                note: String::new(),
                evidence: vec![],
            },
            Verdict {
                step_ordinal: 2,
                kind: VerdictKind::Deviation,
                note: "button missing".to_string(),
                evidence: vec![3],
            },
        ]);

        assert_eq!(result.first_deviation(), Some(2));
        assert!(!result.is_clean());
    }

    #[test]
    fn test_verdict_serializes_kind_by_name() {
        let verdict = Verdict {
            step_ordinal: 1,
            kind: VerdictKind::Skipped,
            note: "n/a".to_string(),
            evidence: vec![],
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["kind"], "Skipped");
        assert!(json.get("evidence").is_none());
    }
}
