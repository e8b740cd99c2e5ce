//! Report rendering.
//!
//! Pure and deterministic: the same plan and result always render to the
//! same bytes. No judgment happens here. Cell text is copied verbatim
//! except for the characters that would break the table: `|` is escaped
//! and line breaks become single spaces.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AnalysisResult, PlanStep, VerdictKind};

/// Fixed column header of every report.
pub const REPORT_HEADER: [&str; 3] = ["Step Description", "Result", "Notes/Evidence"];

/// Title used when none is configured.
pub const DEFAULT_TITLE: &str = "Plan Deviation Report";

/// Errors from report rendering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Plan has {plan} steps but the result has {verdicts} verdicts")]
    Misaligned { plan: usize, verdicts: usize },

    #[error("Verdict {position} is for step {actual}, plan step is {expected}")]
    OrdinalMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },
}

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub description: String,
    pub kind: VerdictKind,
    pub note: String,
}

impl ReportRow {
    /// `✅ **Observed**`
    pub fn marker(&self) -> String {
        format!("{} **{}**", self.kind.glyph(), self.kind.label())
    }
}

/// Counts per verdict kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub observed: usize,
    pub deviation: usize,
    pub skipped: usize,
}

impl ReportSummary {
    pub fn total(&self) -> usize {
        self.observed + self.deviation + self.skipped
    }
}

/// A rendered audit report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn header(&self) -> [&'static str; 3] {
        REPORT_HEADER
    }

    pub fn summary(&self) -> ReportSummary {
        self.rows
            .iter()
            .fold(ReportSummary::default(), |mut acc, row| {
                match row.kind {
                    VerdictKind::Observed => acc.observed += 1,
                    VerdictKind::Deviation => acc.deviation += 1,
                    VerdictKind::Skipped => acc.skipped += 1,
                }
                acc
            })
    }

    /// Render as a Markdown table.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_markdown(&mut out);
        out
    }

    /// Render as a Markdown table into any writer.
    pub fn write_markdown<W: std::fmt::Write>(&self, out: &mut W) -> std::fmt::Result {
        writeln!(out, "# {}", escape_cell(&self.title))?;
        writeln!(out)?;
        writeln!(out, "| {} |", REPORT_HEADER.join(" | "))?;
        writeln!(out, "| :--- | :--- | :--- |")?;
        for row in &self.rows {
            writeln!(
                out,
                "| {} | {} | {} |",
                escape_cell(&row.description),
                row.marker(),
                escape_cell(&row.note)
            )?;
        }
        Ok(())
    }
}

/// Neutralize characters that would break a table cell.
///
/// `|` becomes `\|`; CRLF, CR and LF each become one space. Every other
/// character is kept.
pub fn escape_cell(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '|' => out.push_str("\\|"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(' ');
            }
            '\n' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Renders plan steps and verdicts into a [`Report`].
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    title: String,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    pub fn render(&self, plan: &[PlanStep], result: &AnalysisResult) -> Result<Report, RenderError> {
        if plan.len() != result.len() {
            return Err(RenderError::Misaligned {
                plan: plan.len(),
                verdicts: result.len(),
            });
        }

        let rows = plan
            .iter()
            .zip(result.iter())
            .enumerate()
            .map(|(i, (step, verdict))| {
                if step.ordinal != verdict.step_ordinal {
                    return Err(RenderError::OrdinalMismatch {
                        position: i + 1,
                        expected: step.ordinal,
                        actual: verdict.step_ordinal,
                    });
                }
                Ok(ReportRow {
                    description: step.description.clone(),
                    kind: verdict.kind,
                    note: verdict.note.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Report {
            title: self.title.clone(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::{enforce_cascade, CandidateVerdict};
    use proptest::prelude::*;

    fn plan(descriptions: &[&str]) -> Vec<PlanStep> {
        descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| PlanStep {
                ordinal: i + 1,
                description: d.to_string(),
            })
            .collect()
    }

    fn result(kinds: &[(VerdictKind, &str)]) -> AnalysisResult {
        enforce_cascade(
            kinds
                .iter()
                .enumerate()
                .map(|(i, (kind, note))| CandidateVerdict {
                    step: i + 1,
                    kind: *kind,
                    note: note.to_string(),
                    evidence: vec![],
                })
                .collect(),
        )
    }

    #[test]
    fn test_markdown_layout() {
        let report = ReportRenderer::new()
            .render(
                &plan(&["Open site", "Click buy", "Verify cart"]),
                &result(&[
                    (VerdictKind::Observed, "Page loaded"),
                    (VerdictKind::Deviation, "Button not found"),
                    (VerdictKind::Observed, ""),
                ]),
            )
            .unwrap();

        let expected = "# Plan Deviation Report\n\
                        \n\
                        | Step Description | Result | Notes/Evidence |\n\
                        | :--- | :--- | :--- |\n\
                        | Open site | ✅ **Observed** | Page loaded |\n\
                        | Click buy | ❌ **Deviation** | Button not found |\n\
                        | Verify cart | ⚠️ **Skipped** | Not evaluated: execution stopped at step 2. |\n";
        assert_eq!(report.to_markdown(), expected);
    }

    #[test]
    fn test_cells_are_neutralized() {
        assert_eq!(escape_cell("a | b"), "a \\| b");
        assert_eq!(escape_cell("line1\nline2\r\nline3\rline4"), "line1 line2 line3 line4");
        assert_eq!(escape_cell("Prix: 5 € ✅ «ok» 日本"), "Prix: 5 € ✅ «ok» 日本");
    }

    #[test]
    fn test_row_with_pipes_keeps_three_columns() {
        let report = ReportRenderer::new()
            .render(
                &plan(&["Type a|b into search"]),
                &result(&[(VerdictKind::Observed, "Typed 'a|b'\nsubmitted")]),
            )
            .unwrap();

        let markdown = report.to_markdown();
        let row = markdown.lines().last().unwrap();
        assert_eq!(row, "| Type a\\|b into search | ✅ **Observed** | Typed 'a\\|b' submitted |");
    }

    #[test]
    fn test_summary_counts() {
        let report = ReportRenderer::new()
            .render(
                &plan(&["a", "b", "c", "d"]),
                &result(&[
                    (VerdictKind::Observed, ""),
                    (VerdictKind::Deviation, ""),
                    (VerdictKind::Observed, ""),
                    (VerdictKind::Observed, ""),
                ]),
            )
            .unwrap();

        let summary = report.summary();
        assert_eq!(
            summary,
            ReportSummary {
                observed: 1,
                deviation: 1,
                skipped: 2
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_custom_title() {
        let report = ReportRenderer::with_title("Hercules Run #7")
            .render(&plan(&["a"]), &result(&[(VerdictKind::Observed, "")]))
            .unwrap();
        assert!(report.to_markdown().starts_with("# Hercules Run #7\n"));
    }

    #[test]
    fn test_misaligned_inputs_are_rejected() {
        let err = ReportRenderer::new()
            .render(&plan(&["a", "b"]), &result(&[(VerdictKind::Observed, "")]))
            .unwrap_err();
        assert_eq!(err, RenderError::Misaligned { plan: 2, verdicts: 1 });
    }

    proptest! {
        #[test]
        fn prop_render_is_idempotent(
            steps in prop::collection::vec(".{0,40}", 1..12),
            deviate_at in prop::option::of(0usize..12),
            note in ".{0,40}",
        ) {
            let plan: Vec<PlanStep> = steps
                .iter()
                .enumerate()
                .map(|(i, d)| PlanStep { ordinal: i + 1, description: d.clone() })
                .collect();
            let kinds: Vec<(VerdictKind, &str)> = (0..plan.len())
                .map(|i| {
                    if Some(i) == deviate_at {
                        (VerdictKind::Deviation, note.as_str())
                    } else {
                        (VerdictKind::Observed, note.as_str())
                    }
                })
                .collect();
            let analysis = result(&kinds);
            let renderer = ReportRenderer::new();

            let first = renderer.render(&plan, &analysis).unwrap().to_markdown();
            let second = renderer.render(&plan, &analysis).unwrap().to_markdown();
            prop_assert_eq!(&first, &second);

            // header + separator + title + blank line + one line per step
            prop_assert_eq!(first.lines().count(), plan.len() + 4);
            for row in first.lines().skip(4) {
                let unescaped_pipes = row.matches('|').count() - row.matches("\\|").count();
                prop_assert_eq!(unescaped_pipes, 4);
            }
        }
    }
}
