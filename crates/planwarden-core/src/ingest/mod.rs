//! Log ingestion: raw JSON document → ordered [`LogEntry`] sequence.
//!
//! ## Accepted shapes
//!
//! - A top-level array: every element is an entry.
//! - A top-level object with both a role field and a content field: one entry.
//! - Any other top-level object: every array-valued field is a stream of
//!   entries, concatenated in document order. This covers the Hercules
//!   `{"planner_agent": [...]}` layout.
//!
//! ## Entry rules
//!
//! - The role tag is read from [`ROLE_FIELDS`] and classified with
//!   [`RoleRules`].
//! - The text payload is the first present content field, flattened with
//!   [`flatten`]. Without one, the whole entry (minus role fields) is used.
//! - The first planner message that declares a `plan` block expands into
//!   one planner entry per plan line. Later declarations are repeats and
//!   become `Unknown`.
//! - Entries whose text is blank are `Unknown`.

mod flatten;
mod plan;
mod roles;

pub use flatten::flatten;
pub use plan::{plan_declaration, plan_lines, PLAN_FIELD};
pub use roles::{RoleRules, ROLE_FIELDS};

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::types::{EntrySource, LogEntry};

/// Entry fields that may carry the text payload, in priority order.
pub const CONTENT_FIELDS: &[&str] = &["content", "text", "message", "output"];

/// Errors that can occur while ingesting a log document.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to parse log document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Log document contains no entries")]
    Empty,
}

/// Parses raw log documents into typed, ordered entries.
#[derive(Debug, Clone, Default)]
pub struct LogIngestor {
    rules: RoleRules,
}

impl LogIngestor {
    /// Create an ingestor with the default role rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an ingestor with custom role rules.
    pub fn with_rules(rules: RoleRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RoleRules {
        &self.rules
    }

    /// Ingest a JSON log document.
    pub fn ingest(&self, document: &str) -> Result<Vec<LogEntry>, IngestError> {
        let root: JsonValue = serde_json::from_str(document)?;
        let raw_entries = collect_raw_entries(&root);
        if raw_entries.is_empty() {
            return Err(IngestError::Empty);
        }

        let mut entries = Vec::with_capacity(raw_entries.len());
        let mut plan_declared = false;

        for raw in raw_entries {
            let (tag, source) = self.classify(raw);
            let content = content_of(raw);

            if source == EntrySource::Planner {
                if let Some(block) = content.as_ref().and_then(|c| plan_declaration(c)) {
                    let lines = plan_lines(&block);
                    if !plan_declared && !lines.is_empty() {
                        plan_declared = true;
                        tracing::debug!(steps = lines.len(), "Expanding plan declaration");
                        for line in lines {
                            push_entry(&mut entries, EntrySource::Planner, tag.clone(), line);
                        }
                    } else {
                        tracing::debug!(tag = ?tag, "Ignoring repeated plan declaration");
                        push_entry(&mut entries, EntrySource::Unknown, tag, block);
                    }
                    continue;
                }

                if plan_declared {
                    tracing::debug!(tag = ?tag, "Ignoring planner message after plan declaration");
                    let text = match &content {
                        Some(value) => flatten(value),
                        None => flatten(&without_role_fields(raw)),
                    };
                    push_entry(&mut entries, EntrySource::Unknown, tag, text);
                    continue;
                }
            }

            let text = match &content {
                Some(value) => flatten(value),
                None => flatten(&without_role_fields(raw)),
            };
            push_entry(&mut entries, source, tag, text);
        }

        Ok(entries)
    }

    fn classify(&self, raw: &JsonValue) -> (Option<String>, EntrySource) {
        let Some(map) = raw.as_object() else {
            return (None, EntrySource::Unknown);
        };

        let tags = ROLE_FIELDS
            .iter()
            .filter_map(|field| map.get(*field).and_then(JsonValue::as_str));
        let (tag, source) = self.rules.classify_first(tags);
        (tag.map(str::to_string), source)
    }
}

fn push_entry(entries: &mut Vec<LogEntry>, source: EntrySource, tag: Option<String>, text: String) {
    let source = if text.trim().is_empty() {
        EntrySource::Unknown
    } else {
        source
    };

    entries.push(LogEntry {
        ordinal: entries.len() + 1,
        source,
        tag,
        text,
    });
}

/// Locate the entry values inside a parsed document.
fn collect_raw_entries(root: &JsonValue) -> Vec<&JsonValue> {
    match root {
        JsonValue::Array(items) => items.iter().collect(),
        JsonValue::Object(map) if is_single_entry(map) => vec![root],
        JsonValue::Object(map) => map
            .values()
            .filter_map(JsonValue::as_array)
            .flat_map(|stream| stream.iter())
            .collect(),
        _ => Vec::new(),
    }
}

fn is_single_entry(map: &Map<String, JsonValue>) -> bool {
    let has_role = ROLE_FIELDS.iter().any(|f| map.get(*f).is_some_and(JsonValue::is_string));
    let has_content = CONTENT_FIELDS.iter().any(|f| map.contains_key(*f));
    has_role && has_content
}

fn content_of(raw: &JsonValue) -> Option<JsonValue> {
    match raw {
        JsonValue::Object(map) => CONTENT_FIELDS
            .iter()
            .filter_map(|field| map.get(*field))
            .find(|v| !v.is_null())
            .cloned(),
        other => Some(other.clone()),
    }
}

fn without_role_fields(raw: &JsonValue) -> JsonValue {
    match raw {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .filter(|(k, _)| !ROLE_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}
