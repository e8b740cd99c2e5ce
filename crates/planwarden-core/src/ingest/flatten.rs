//! Recursive flattening of nested JSON payloads into entry text.
//!
//! Strings are copied verbatim (no escaping, non-ASCII kept as is).
//! Objects become `key: value` lines in document order, arrays become one
//! line group per item, and nesting is shown with two-space indentation.
//! `null` carries no text and is dropped.

use serde_json::Value as JsonValue;

const INDENT: &str = "  ";

/// Flatten any JSON value into a single text payload.
pub fn flatten(value: &JsonValue) -> String {
    if let JsonValue::String(s) = value {
        return s.clone();
    }

    let mut lines = Vec::new();
    flatten_into(value, 0, &mut lines);
    lines.join("\n")
}

fn flatten_into(value: &JsonValue, depth: usize, lines: &mut Vec<String>) {
    let pad = INDENT.repeat(depth);
    match value {
        JsonValue::Null => {}
        JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_) => {
            if let Some(text) = scalar_text(value) {
                lines.push(format!("{}{}", pad, text));
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                flatten_into(item, depth, lines);
            }
        }
        JsonValue::Object(map) => {
            for (key, child) in map {
                if let Some(text) = scalar_text(child) {
                    lines.push(format!("{}{}: {}", pad, key, text));
                    continue;
                }

                let mut nested = Vec::new();
                flatten_into(child, depth + 1, &mut nested);
                if !nested.is_empty() {
                    lines.push(format!("{}{}:", pad, key));
                    lines.extend(nested);
                }
            }
        }
    }
}

fn scalar_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_is_verbatim() {
        let value = json!("Click \"Add to cart\" → ✅ 成功\n  next line");
        assert_eq!(flatten(&value), "Click \"Add to cart\" → ✅ 成功\n  next line");
    }

    #[test]
    fn test_object_keeps_document_order() {
        let value = json!({"zeta": "last key first", "alpha": 2, "flag": true});
        assert_eq!(flatten(&value), "zeta: last key first\nalpha: 2\nflag: true");
    }

    #[test]
    fn test_nested_structures_are_indented() {
        let value = json!({
            "action": "click",
            "target": {"selector": "#buy", "text": "Kaufen €"},
            "results": ["ok", {"status": 200}]
        });

        let expected = "action: click\n\
                        target:\n  selector: #buy\n  text: Kaufen €\n\
                        results:\n  ok\n  status: 200";
        assert_eq!(flatten(&value), expected);
    }

    #[test]
    fn test_nulls_and_empty_containers_are_dropped() {
        let value = json!({"a": null, "b": [], "c": {}, "d": "kept"});
        assert_eq!(flatten(&value), "d: kept");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(flatten(&json!(42)), "42");
        assert_eq!(flatten(&json!(false)), "false");
        assert_eq!(flatten(&json!(null)), "");
    }
}
