//! # planwarden-core
//!
//! Deterministic plan-vs-evidence audit pipeline for autonomous UI-test
//! executions.
//!
//! This crate answers one question: did the agent actually do what its
//! plan said it would? It provides every stage that does not need a
//! model:
//!
//! 1. **Ingest**: raw JSON log → ordered, role-classified [`LogEntry`]s
//! 2. **Split**: entries → ordered [`PlanStep`]s and [`EvidenceItem`]s
//! 3. **Judge** (deterministic half): validate a capability's verdicts and
//!    enforce the cascading-skip rule
//! 4. **Render**: verdicts → Markdown [`Report`]
//!
//! ## Key Guarantees
//!
//! 1. **No I/O, no model calls**: everything here is pure
//! 2. **Strict**: malformed judgments are rejected, never repaired
//! 3. **Cascading skip**: after the first deviation, every later step is
//!    `Skipped`
//! 4. **Lossless text**: log text is never escaped or re-encoded
//!
//! ## Example
//!
//! ```rust,ignore
//! use planwarden_core::{judge_payload, JudgmentRequest, LogIngestor, PlanEvidenceSplitter, ReportRenderer};
//!
//! let entries = LogIngestor::new().ingest(&document)?;
//! let split = PlanEvidenceSplitter::split(&entries)?;
//! let request = JudgmentRequest::new(&split.plan, &split.evidence);
//!
//! // payload comes from a judgment capability (see planwarden-runtime)
//! let analysis = judge_payload(&payload, &request)?;
//! let report = ReportRenderer::new().render(&split.plan, &analysis)?;
//! println!("{}", report.to_markdown());
//! ```

pub mod ingest;
pub mod judgment;
pub mod report;
pub mod split;
pub mod types;

// Re-export main types at crate root
pub use ingest::{IngestError, LogIngestor, RoleRules};
pub use judgment::{
    enforce_cascade, judge_payload, parse_candidates, validate_alignment, CandidateVerdict,
    JudgmentRequest, MalformedJudgment,
};
pub use report::{RenderError, Report, ReportRenderer, ReportRow, ReportSummary, REPORT_HEADER};
pub use split::{EmptyPlanError, PlanEvidenceSplitter, SplitLog};
pub use types::{AnalysisResult, EntrySource, EvidenceItem, LogEntry, PlanStep, Verdict, VerdictKind};
