//! Deterministic half of plan-vs-evidence comparison.
//!
//! # Core Principle
//! The judgment capability proposes verdicts; it does not decide them.
//!
//! Everything the capability returns goes through three gates before it
//! becomes an [`AnalysisResult`]:
//! 1. Structure: the payload must match the embedded JSON Schema and use
//!    the verdict vocabulary.
//! 2. Alignment: exactly one verdict per plan step, in plan order, citing
//!    only evidence that exists.
//! 3. Cascade: after the first `Deviation` every later step is `Skipped`,
//!    whatever the capability said.
//!
//! Gates 1 and 2 reject; they never repair. Gate 3 always overrides.

mod schema;

pub use schema::{validate_judgment_schema, SchemaError};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{AnalysisResult, EvidenceItem, PlanStep, Verdict, VerdictKind};

/// Field name under which a payload object may wrap its verdict list.
pub const VERDICTS_FIELD: &str = "verdicts";

/// Structural problems with a judgment payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedJudgment {
    #[error("Response could not be parsed: {0}")]
    Unparsable(String),

    #[error("Response failed schema validation: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("Response could not be decoded: {0}")]
    Decode(String),

    #[error("Unknown verdict '{label}' at position {position}")]
    UnknownVerdict { position: usize, label: String },

    #[error("Expected {expected} verdicts (one per plan step), got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Verdict at position {position} is for step {actual}, expected step {expected}")]
    OrdinalMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Verdict for step {step} cites evidence {cited}, but only {available} items exist")]
    EvidenceOutOfRange {
        step: usize,
        cited: usize,
        available: usize,
    },
}

/// The question put to a judgment capability: the whole plan and the
/// whole evidence transcript, ordinals included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentRequest {
    pub plan: Vec<PlanStep>,
    pub evidence: Vec<EvidenceItem>,
}

impl JudgmentRequest {
    pub fn new(plan: &[PlanStep], evidence: &[EvidenceItem]) -> Self {
        Self {
            plan: plan.to_vec(),
            evidence: evidence.to_vec(),
        }
    }

    /// Numbered plan, one step per line: `1. Open the page`.
    pub fn plan_listing(&self) -> String {
        self.plan
            .iter()
            .map(|step| format!("{}. {}", step.ordinal, step.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Evidence transcript with ordinals: `[Evidence 3] ...`.
    ///
    /// With `max_chars`, each item is cut to that many characters and
    /// marked with `…`. Cutting happens on character boundaries.
    pub fn evidence_transcript(&self, max_chars: Option<usize>) -> String {
        if self.evidence.is_empty() {
            return "(no evidence recorded)".to_string();
        }

        self.evidence
            .iter()
            .map(|item| {
                let text = match max_chars {
                    Some(limit) => truncate_chars(&item.description, limit),
                    None => item.description.clone(),
                };
                format!("[Evidence {}] {}", item.ordinal, text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// One verdict as proposed by the capability, after structural checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateVerdict {
    pub step: usize,
    pub kind: VerdictKind,
    pub note: String,
    pub evidence: Vec<usize>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    step: usize,
    verdict: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    evidence: Vec<usize>,
}

/// Decode a payload into candidate verdicts.
///
/// Accepts a bare array or an object wrapping the array under
/// `"verdicts"`.
pub fn parse_candidates(payload: &JsonValue) -> Result<Vec<CandidateVerdict>, MalformedJudgment> {
    let list = match payload {
        JsonValue::Object(map) => map.get(VERDICTS_FIELD).unwrap_or(payload),
        _ => payload,
    };

    validate_judgment_schema(list).map_err(MalformedJudgment::Schema)?;

    let raw: Vec<RawVerdict> = serde_json::from_value(list.clone())
        .map_err(|e| MalformedJudgment::Decode(e.to_string()))?;

    raw.into_iter()
        .enumerate()
        .map(|(i, r)| {
            let kind = VerdictKind::parse(&r.verdict).ok_or_else(|| {
                MalformedJudgment::UnknownVerdict {
                    position: i + 1,
                    label: r.verdict.clone(),
                }
            })?;
            Ok(CandidateVerdict {
                step: r.step,
                kind,
                note: r.note.unwrap_or_default(),
                evidence: r.evidence,
            })
        })
        .collect()
}

/// Check that candidates line up with the plan and cite real evidence.
pub fn validate_alignment(
    candidates: &[CandidateVerdict],
    plan: &[PlanStep],
    evidence: &[EvidenceItem],
) -> Result<(), MalformedJudgment> {
    if candidates.len() != plan.len() {
        return Err(MalformedJudgment::LengthMismatch {
            expected: plan.len(),
            actual: candidates.len(),
        });
    }

    for (i, (candidate, step)) in candidates.iter().zip(plan).enumerate() {
        if candidate.step != step.ordinal {
            return Err(MalformedJudgment::OrdinalMismatch {
                position: i + 1,
                expected: step.ordinal,
                actual: candidate.step,
            });
        }

        if let Some(&cited) = candidate
            .evidence
            .iter()
            .find(|&&e| e == 0 || e > evidence.len())
        {
            return Err(MalformedJudgment::EvidenceOutOfRange {
                step: candidate.step,
                cited,
                available: evidence.len(),
            });
        }
    }

    Ok(())
}

/// Note used for a skipped step when the capability gave none.
pub fn skip_note(boundary: usize) -> String {
    format!("Not evaluated: execution stopped at step {}.", boundary)
}

/// Apply the cascading-skip rule and build the final result.
///
/// Scans in order. A `Skipped` proposed before any deviation is promoted
/// to `Deviation`: the capability is saying the step never happened, and
/// that is the failure boundary. Everything after the boundary is forced
/// to `Skipped`, keeping the capability's note when it has one.
pub fn enforce_cascade(candidates: Vec<CandidateVerdict>) -> AnalysisResult {
    let mut boundary: Option<usize> = None;

    let verdicts = candidates
        .into_iter()
        .map(|candidate| {
            let kind = match (boundary, candidate.kind) {
                (Some(_), _) => VerdictKind::Skipped,
                (None, VerdictKind::Skipped) => {
                    tracing::warn!(
                        step = candidate.step,
                        "Skipped proposed before any deviation; treating as deviation"
                    );
                    boundary = Some(candidate.step);
                    VerdictKind::Deviation
                }
                (None, VerdictKind::Deviation) => {
                    boundary = Some(candidate.step);
                    VerdictKind::Deviation
                }
                (None, VerdictKind::Observed) => VerdictKind::Observed,
            };

            let note = match boundary {
                Some(b) if kind == VerdictKind::Skipped && candidate.note.trim().is_empty() => {
                    skip_note(b)
                }
                _ => candidate.note,
            };

            Verdict {
                step_ordinal: candidate.step,
                kind,
                note,
                evidence: candidate.evidence,
            }
        })
        .collect();

    AnalysisResult::new(verdicts)
}

/// Turn a raw payload into a validated, cascade-enforced result.
pub fn judge_payload(
    payload: &JsonValue,
    request: &JudgmentRequest,
) -> Result<AnalysisResult, MalformedJudgment> {
    let candidates = parse_candidates(payload)?;
    validate_alignment(&candidates, &request.plan, &request.evidence)?;
    Ok(enforce_cascade(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn plan(n: usize) -> Vec<PlanStep> {
        (1..=n)
            .map(|i| PlanStep {
                ordinal: i,
                description: format!("step {}", i),
            })
            .collect()
    }

    fn evidence(n: usize) -> Vec<EvidenceItem> {
        (1..=n)
            .map(|i| EvidenceItem {
                ordinal: i,
                description: format!("observed {}", i),
            })
            .collect()
    }

    fn candidate(step: usize, kind: VerdictKind, note: &str) -> CandidateVerdict {
        CandidateVerdict {
            step,
            kind,
            note: note.to_string(),
            evidence: vec![],
        }
    }

    fn kinds(result: &AnalysisResult) -> Vec<VerdictKind> {
        result.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn test_request_text_preserves_ordinals() {
        let request = JudgmentRequest::new(&plan(2), &evidence(2));
        assert_eq!(request.plan_listing(), "1. step 1\n2. step 2");
        assert_eq!(
            request.evidence_transcript(None),
            "[Evidence 1] observed 1\n\n[Evidence 2] observed 2"
        );
    }

    #[test]
    fn test_transcript_truncates_on_char_boundaries() {
        let request = JudgmentRequest::new(
            &plan(1),
            &[EvidenceItem {
                ordinal: 1,
                description: "ÄÖÜ✅🎉 tail".to_string(),
            }],
        );
        assert_eq!(request.evidence_transcript(Some(4)), "[Evidence 1] ÄÖÜ✅…");
        assert_eq!(request.evidence_transcript(Some(100)), "[Evidence 1] ÄÖÜ✅🎉 tail");
    }

    #[test]
    fn test_empty_transcript_is_explicit() {
        let request = JudgmentRequest::new(&plan(1), &[]);
        assert_eq!(request.evidence_transcript(None), "(no evidence recorded)");
    }

    #[test]
    fn test_parse_bare_and_wrapped_payloads() {
        let bare = json!([{"step": 1, "verdict": "observed", "note": "ok", "evidence": [1]}]);
        let wrapped = json!({"verdicts": [{"step": 1, "verdict": "OBSERVED", "note": "ok", "evidence": [1]}]});

        let a = parse_candidates(&bare).unwrap();
        let b = parse_candidates(&wrapped).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].kind, VerdictKind::Observed);
        assert_eq!(a[0].evidence, vec![1]);
    }

    #[test]
    fn test_parse_null_note_is_empty() {
        let payload = json!([{"step": 1, "verdict": "Deviation", "note": null}]);
        let parsed = parse_candidates(&payload).unwrap();
        assert_eq!(parsed[0].note, "");
    }

    #[test]
    fn test_parse_rejects_unknown_verdict() {
        let payload = json!([{"step": 1, "verdict": "Passed"}]);
        assert_eq!(
            parse_candidates(&payload),
            Err(MalformedJudgment::UnknownVerdict {
                position: 1,
                label: "Passed".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_schema_violations() {
        let payload = json!([{"verdict": "Observed"}]);
        assert!(matches!(
            parse_candidates(&payload),
            Err(MalformedJudgment::Schema(_))
        ));

        let payload = json!("Observed, Observed, Deviation");
        assert!(matches!(
            parse_candidates(&payload),
            Err(MalformedJudgment::Schema(_))
        ));
    }

    #[test]
    fn test_alignment_length_mismatch() {
        let candidates: Vec<_> = (1..=3)
            .map(|i| candidate(i, VerdictKind::Observed, ""))
            .collect();
        assert_eq!(
            validate_alignment(&candidates, &plan(5), &[]),
            Err(MalformedJudgment::LengthMismatch {
                expected: 5,
                actual: 3
            })
        );
    }

    #[test]
    fn test_alignment_ordinal_mismatch() {
        let candidates = vec![
            candidate(1, VerdictKind::Observed, ""),
            candidate(3, VerdictKind::Observed, ""),
            candidate(2, VerdictKind::Observed, ""),
        ];
        assert_eq!(
            validate_alignment(&candidates, &plan(3), &[]),
            Err(MalformedJudgment::OrdinalMismatch {
                position: 2,
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_alignment_duplicate_ordinal() {
        let candidates = vec![
            candidate(1, VerdictKind::Observed, ""),
            candidate(1, VerdictKind::Observed, ""),
        ];
        assert!(matches!(
            validate_alignment(&candidates, &plan(2), &[]),
            Err(MalformedJudgment::OrdinalMismatch { position: 2, .. })
        ));
    }

    #[test]
    fn test_alignment_rejects_missing_evidence() {
        let mut c = candidate(1, VerdictKind::Observed, "");
        c.evidence = vec![1, 4];
        assert_eq!(
            validate_alignment(&[c], &plan(1), &evidence(3)),
            Err(MalformedJudgment::EvidenceOutOfRange {
                step: 1,
                cited: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_cascade_overrides_observed_after_deviation() {
        let result = enforce_cascade(vec![
            candidate(1, VerdictKind::Observed, "ok"),
            candidate(2, VerdictKind::Deviation, "button missing"),
            candidate(3, VerdictKind::Observed, "claims success"),
            candidate(4, VerdictKind::Deviation, ""),
        ]);

        assert_eq!(
            kinds(&result),
            vec![
                VerdictKind::Observed,
                VerdictKind::Deviation,
                VerdictKind::Skipped,
                VerdictKind::Skipped
            ]
        );
        assert_eq!(result.verdicts()[2].note, "claims success");
        assert_eq!(
            result.verdicts()[3].note,
            "Not evaluated: execution stopped at step 2."
        );
    }

    #[test]
    fn test_cascade_promotes_leading_skip() {
        let result = enforce_cascade(vec![
            candidate(1, VerdictKind::Skipped, ""),
            candidate(2, VerdictKind::Observed, ""),
        ]);
        assert_eq!(
            kinds(&result),
            vec![VerdictKind::Deviation, VerdictKind::Skipped]
        );
        assert_eq!(result.first_deviation(), Some(1));
    }

    #[test]
    fn test_judge_payload_scenario() {
        let request = JudgmentRequest::new(&plan(5), &evidence(3));
        let payload = json!([
            {"step": 1, "verdict": "Observed", "evidence": [1]},
            {"step": 2, "verdict": "Observed", "evidence": [2]},
            {"step": 3, "verdict": "Observed", "evidence": [3]},
            {"step": 4, "verdict": "Deviation", "note": "Cart stayed empty"},
            {"step": 5, "verdict": "Deviation", "note": "No evidence"}
        ]);

        let result = judge_payload(&payload, &request).unwrap();
        assert_eq!(
            kinds(&result),
            vec![
                VerdictKind::Observed,
                VerdictKind::Observed,
                VerdictKind::Observed,
                VerdictKind::Deviation,
                VerdictKind::Skipped
            ]
        );
    }

    fn arb_kind() -> impl Strategy<Value = VerdictKind> {
        prop_oneof![
            Just(VerdictKind::Observed),
            Just(VerdictKind::Deviation),
            Just(VerdictKind::Skipped),
        ]
    }

    proptest! {
        #[test]
        fn prop_cascade_invariants(proposed in prop::collection::vec(arb_kind(), 1..40)) {
            let candidates: Vec<_> = proposed
                .iter()
                .enumerate()
                .map(|(i, k)| candidate(i + 1, *k, ""))
                .collect();

            let result = enforce_cascade(candidates);

            prop_assert_eq!(result.len(), proposed.len());
            prop_assert_ne!(result.verdicts()[0].kind, VerdictKind::Skipped);

            let mut seen_deviation = false;
            for (i, verdict) in result.iter().enumerate() {
                prop_assert_eq!(verdict.step_ordinal, i + 1);
                if seen_deviation {
                    prop_assert_eq!(verdict.kind, VerdictKind::Skipped);
                    prop_assert!(!verdict.note.is_empty());
                } else {
                    prop_assert_ne!(verdict.kind, VerdictKind::Skipped);
                }
                if verdict.kind == VerdictKind::Deviation {
                    seen_deviation = true;
                }
            }
        }

        #[test]
        fn prop_all_observed_stays_observed(n in 1usize..40) {
            let candidates: Vec<_> = (1..=n)
                .map(|i| candidate(i, VerdictKind::Observed, "seen"))
                .collect();
            let result = enforce_cascade(candidates);
            prop_assert!(result.is_clean());
            prop_assert_eq!(result.first_deviation(), None);
        }
    }
}
