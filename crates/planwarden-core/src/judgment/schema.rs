//! JSON Schema validation for judgment payloads.
//!
//! Payloads are validated against schema/judgment.schema.json before they
//! are decoded, so structural problems are reported with their location.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded judgment schema (loaded at compile time).
const JUDGMENT_SCHEMA_JSON: &str = include_str!("../../schema/judgment.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(JUDGMENT_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a judgment payload against the schema.
///
/// Returns every violation as `"<message> at <instance path>"`.
pub fn validate_judgment_schema(payload: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(payload)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_compiles() {
        assert!(get_validator().is_ok());
    }

    #[test]
    fn test_valid_payload_passes() {
        let payload = json!([
            {"step": 1, "verdict": "Observed", "note": "Seen in evidence 2", "evidence": [2]},
            {"step": 2, "verdict": "deviation", "note": null},
            {"step": 3, "verdict": "Skipped", "extra": "ignored"}
        ]);
        assert!(validate_judgment_schema(&payload).is_ok());
    }

    #[test]
    fn test_missing_verdict_fails() {
        let payload = json!([{"step": 1, "note": "no verdict"}]);
        let errors = validate_judgment_schema(&payload).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_string_step_fails() {
        let payload = json!([{"step": "1", "verdict": "Observed"}]);
        assert!(validate_judgment_schema(&payload).is_err());
    }

    #[test]
    fn test_non_array_fails() {
        let payload = json!({"step": 1, "verdict": "Observed"});
        assert!(validate_judgment_schema(&payload).is_err());
    }

    #[test]
    fn test_zero_evidence_ordinal_fails() {
        let payload = json!([{"step": 1, "verdict": "Observed", "evidence": [0]}]);
        assert!(validate_judgment_schema(&payload).is_err());
    }
}
