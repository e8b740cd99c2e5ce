//! Plan / evidence partitioning.
//!
//! Planner entries become the plan, evidence entries become the
//! transcript, `Unknown` entries are dropped. Both outputs keep original
//! relative order and are renumbered from 1.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EntrySource, EvidenceItem, LogEntry, PlanStep};

/// The log contained no planner entries, so there is nothing to audit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No plan steps found: the log has no planner entries ({entries} entries scanned)")]
pub struct EmptyPlanError {
    /// Number of entries that were scanned
    pub entries: usize,
}

/// Ordered plan and evidence extracted from a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitLog {
    pub plan: Vec<PlanStep>,
    pub evidence: Vec<EvidenceItem>,
}

/// Partitions log entries into plan steps and evidence items.
pub struct PlanEvidenceSplitter;

impl PlanEvidenceSplitter {
    pub fn split(entries: &[LogEntry]) -> Result<SplitLog, EmptyPlanError> {
        let plan: Vec<PlanStep> = entries
            .iter()
            .filter(|e| e.source == EntrySource::Planner)
            .enumerate()
            .map(|(i, e)| PlanStep {
                ordinal: i + 1,
                description: e.text.clone(),
            })
            .collect();

        if plan.is_empty() {
            return Err(EmptyPlanError {
                entries: entries.len(),
            });
        }

        let evidence = entries
            .iter()
            .filter(|e| e.source == EntrySource::Evidence)
            .enumerate()
            .map(|(i, e)| EvidenceItem {
                ordinal: i + 1,
                description: e.text.clone(),
            })
            .collect();

        let unknown = entries
            .iter()
            .filter(|e| e.source == EntrySource::Unknown)
            .count();
        if unknown > 0 {
            tracing::debug!(unknown, "Dropped entries with unrecognized roles");
        }

        Ok(SplitLog { plan, evidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ordinal: usize, source: EntrySource, text: &str) -> LogEntry {
        LogEntry {
            ordinal,
            source,
            tag: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_split_preserves_relative_order() {
        let entries = vec![
            entry(1, EntrySource::Unknown, "boot"),
            entry(2, EntrySource::Planner, "Open page"),
            entry(3, EntrySource::Evidence, "Page opened"),
            entry(4, EntrySource::Planner, "Click buy"),
            entry(5, EntrySource::Evidence, "Clicked"),
            entry(6, EntrySource::Evidence, "Cart shows 1"),
            entry(7, EntrySource::Planner, "Verify cart"),
        ];

        let split = PlanEvidenceSplitter::split(&entries).unwrap();

        assert_eq!(
            split.plan,
            vec![
                PlanStep { ordinal: 1, description: "Open page".to_string() },
                PlanStep { ordinal: 2, description: "Click buy".to_string() },
                PlanStep { ordinal: 3, description: "Verify cart".to_string() },
            ]
        );
        assert_eq!(
            split
                .evidence
                .iter()
                .map(|e| (e.ordinal, e.description.as_str()))
                .collect::<Vec<_>>(),
            vec![(1, "Page opened"), (2, "Clicked"), (3, "Cart shows 1")]
        );
    }

    #[test]
    fn test_no_planner_entries_is_an_error() {
        let entries = vec![
            entry(1, EntrySource::Evidence, "Clicked"),
            entry(2, EntrySource::Unknown, "noise"),
        ];

        let err = PlanEvidenceSplitter::split(&entries).unwrap_err();
        assert_eq!(err, EmptyPlanError { entries: 2 });
    }

    #[test]
    fn test_plan_without_evidence_is_allowed() {
        let entries = vec![entry(1, EntrySource::Planner, "Open page")];
        let split = PlanEvidenceSplitter::split(&entries).unwrap();
        assert_eq!(split.plan.len(), 1);
        assert!(split.evidence.is_empty());
    }
}
