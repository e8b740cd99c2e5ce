//! Plan declarations inside planner messages.
//!
//! Structured planners (Hercules among them) send the whole plan as a
//! numbered block in a `plan` field, and repeat it on every turn.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

lazy_static! {
    /// Leading list marker: `1.`, `12)`, `-`, `*`, `•`
    static ref LIST_MARKER: Regex = Regex::new(r"^\s*(?:\d+[.)]|[-*•])(?:\s+|$)").unwrap();
}

/// Field of a planner message that holds the plan block.
pub const PLAN_FIELD: &str = "plan";

/// Extract the plan block from a planner message's content, if it has one.
///
/// Content may be an object or a string that itself holds a JSON object
/// (LLM replies are often logged that way).
pub fn plan_declaration(content: &JsonValue) -> Option<String> {
    match content {
        JsonValue::Object(map) => map.get(PLAN_FIELD)?.as_str().map(str::to_string),
        JsonValue::String(s) if s.trim_start().starts_with('{') => {
            let parsed: JsonValue = serde_json::from_str(s).ok()?;
            parsed.get(PLAN_FIELD)?.as_str().map(str::to_string)
        }
        _ => None,
    }
}

/// Split a plan block into step descriptions.
///
/// Blank lines are dropped and list markers stripped; the rest of each
/// line is kept unchanged apart from surrounding whitespace.
pub fn plan_lines(plan: &str) -> Vec<String> {
    plan.lines()
        .map(|line| LIST_MARKER.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
