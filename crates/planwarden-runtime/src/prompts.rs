//! Prompts for the LLM-backed judgment capability.
//!
//! The system prompt is static so providers with prompt caching can reuse
//! it across runs. Everything run-specific goes in the user prompt.

use planwarden_core::JudgmentRequest;

/// Per-item cap applied to evidence text in the user prompt.
pub const DEFAULT_EVIDENCE_CHAR_LIMIT: usize = 1500;

/// System prompt for plan-vs-evidence verification.
pub const JUDGMENT_SYSTEM_PROMPT: &str = r#"
You are an expert QA analyst auditing an autonomous UI-test agent.

You receive the agent's PLAN (numbered steps) and its EXECUTION LOG
(numbered evidence items). The execution log is the ground truth: it is
what the agent's tools actually observed in the browser, DOM, API or
database.

For EACH plan step, in order, decide exactly one verdict:
- "Observed": the evidence confirms the step happened as planned.
- "Deviation": the evidence shows a failure, an error, a missing element,
  a different action than planned, or no trace of the step at all.
- "Skipped": the step comes after an earlier Deviation and was never
  attempted.

Rules:
1. Judge only against the evidence you are given. Do not assume success.
2. Cite the evidence items you relied on by their numbers.
3. Keep each note to one or two sentences a tester can act on.
4. Return one verdict per plan step, in plan order, step numbers included.

## Output Format (JSON only, no markdown)
{
  "verdicts": [
    {
      "step": 1,
      "verdict": "Observed" | "Deviation" | "Skipped",
      "note": "short justification",
      "evidence": [1, 2]
    }
  ]
}
"#;

/// Build the run-specific user prompt.
pub fn build_user_prompt(request: &JudgmentRequest, evidence_char_limit: usize) -> String {
    format!(
        "PLAN TO VERIFY ({steps} steps):\n{plan}\n\n\
         EXECUTION LOG ({items} evidence items):\n{evidence}\n\n\
         Return exactly {steps} verdicts, one per plan step.",
        steps = request.plan.len(),
        plan = request.plan_listing(),
        items = request.evidence.len(),
        evidence = request.evidence_transcript(Some(evidence_char_limit)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use planwarden_core::{EvidenceItem, PlanStep};

    #[test]
    fn test_system_prompt_names_every_verdict() {
        for label in ["\"Observed\"", "\"Deviation\"", "\"Skipped\""] {
            assert!(JUDGMENT_SYSTEM_PROMPT.contains(label));
        }
        assert!(JUDGMENT_SYSTEM_PROMPT.contains("\"verdicts\""));
    }

    #[test]
    fn test_user_prompt_keeps_ordinals() {
        let request = JudgmentRequest::new(
            &[
                PlanStep { ordinal: 1, description: "Open the login page".into() },
                PlanStep { ordinal: 2, description: "Submit credentials".into() },
            ],
            &[EvidenceItem { ordinal: 1, description: "GET /login 200".into() }],
        );

        let prompt = build_user_prompt(&request, DEFAULT_EVIDENCE_CHAR_LIMIT);
        assert!(prompt.contains("1. Open the login page\n2. Submit credentials"));
        assert!(prompt.contains("[Evidence 1] GET /login 200"));
        assert!(prompt.contains("Return exactly 2 verdicts"));
    }

    #[test]
    fn test_user_prompt_truncates_long_evidence() {
        let request = JudgmentRequest::new(
            &[PlanStep { ordinal: 1, description: "Read page".into() }],
            &[EvidenceItem { ordinal: 1, description: "é".repeat(50) }],
        );

        let prompt = build_user_prompt(&request, 10);
        assert!(prompt.contains(&format!("[Evidence 1] {}…", "é".repeat(10))));
    }
}
