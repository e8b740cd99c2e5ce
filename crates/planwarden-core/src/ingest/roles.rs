//! Role classification rules.
//!
//! Maps the raw role discriminator of a log entry (agent name, message
//! role, source label) to an [`EntrySource`]. Matching is
//! case-insensitive; a tag listed as both planner and evidence counts as
//! planner.

use serde::{Deserialize, Serialize};

use crate::types::EntrySource;

/// Entry fields that may carry a role discriminator, most specific first.
pub const ROLE_FIELDS: &[&str] = &["name", "agent", "source", "role", "type"];

const DEFAULT_PLANNER_TAGS: &[&str] = &[
    "planner",
    "planner_agent",
    "plan",
    "planning",
    "intent",
    "intention",
];

const DEFAULT_EVIDENCE_TAGS: &[&str] = &[
    "user",
    "observation",
    "observer",
    "evidence",
    "execution",
    "executor",
    "tool",
    "browser_nav_agent",
    "api_nav_agent",
    "sql_nav_agent",
    "helper",
];

/// Tag lists used to classify entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRules {
    /// Tags that mark planning / intention entries
    #[serde(default = "default_planner_tags")]
    pub planner_tags: Vec<String>,

    /// Tags that mark execution / observation entries
    #[serde(default = "default_evidence_tags")]
    pub evidence_tags: Vec<String>,
}

fn default_planner_tags() -> Vec<String> {
    DEFAULT_PLANNER_TAGS.iter().map(|s| s.to_string()).collect()
}

fn default_evidence_tags() -> Vec<String> {
    DEFAULT_EVIDENCE_TAGS.iter().map(|s| s.to_string()).collect()
}

impl Default for RoleRules {
    fn default() -> Self {
        Self {
            planner_tags: default_planner_tags(),
            evidence_tags: default_evidence_tags(),
        }
    }
}

impl RoleRules {
    /// Classify a single tag.
    pub fn classify(&self, tag: &str) -> EntrySource {
        let tag = tag.trim();
        if self.planner_tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            EntrySource::Planner
        } else if self.evidence_tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            EntrySource::Evidence
        } else {
            EntrySource::Unknown
        }
    }

    /// Classify a candidate list of tags in priority order.
    ///
    /// The first tag that classifies as planner or evidence wins. If none
    /// does, the first tag is reported as the entry's tag and the entry is
    /// `Unknown`.
    pub fn classify_first<'a, I>(&self, tags: I) -> (Option<&'a str>, EntrySource)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fallback = None;
        for tag in tags {
            match self.classify(tag) {
                EntrySource::Unknown => {
                    fallback.get_or_insert(tag);
                }
                known => return (Some(tag), known),
            }
        }
        (fallback, EntrySource::Unknown)
    }
}
