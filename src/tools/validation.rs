//! JSON Schema validation of tool arguments and structured output.

use serde_json::Value;

/// Validate a JSON value against a JSON Schema.
///
/// Returns `Err` with every violation joined by `"; "`, or a message
/// describing why the schema itself could not be compiled.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| format!("invalid JSON schema: {e}"))?;
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Parse raw JSON text and validate it, returning the parsed value.
///
/// Empty input is rejected rather than treated as an empty object.
pub fn validate_json(raw: &str, schema: &Value) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Err("empty json".to_string());
    }
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid json: {e}"))?;
    validate_arguments(&value, schema)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn foo_bar() -> Value {
        json!({
            "type": "object",
            "properties": {
                "foo": { "type": "string" },
                "bar": { "type": "integer" },
            },
            "required": ["foo", "bar"],
        })
    }

    #[test]
    fn rejects_missing_required_field() {
        let err = validate_arguments(&json!({"foo": "hi"}), &foo_bar()).unwrap_err();
        assert!(err.contains("bar"), "{err}");
    }

    #[test]
    fn rejects_field_with_wrong_type() {
        let err = validate_arguments(&json!({"foo": "hi", "bar": "oops"}), &foo_bar()).unwrap_err();
        assert!(err.contains("integer"), "{err}");
    }

    #[test]
    fn reports_every_violation() {
        let err = validate_arguments(&json!({"foo": 1, "bar": "x"}), &foo_bar()).unwrap_err();
        assert_eq!(err.split("; ").count(), 2, "{err}");
    }

    #[test]
    fn accepts_valid_value_and_extra_fields() {
        assert!(validate_arguments(&json!({"foo": "hi", "bar": 7, "extra": true}), &foo_bar()).is_ok());
    }

    #[test]
    fn nested_schemas_are_checked() {
        let schema = json!({
            "type": "object",
            "properties": { "items": { "type": "array", "items": { "type": "number" } } },
        });
        assert!(validate_arguments(&json!({"items": [1, 2.5]}), &schema).is_ok());
        assert!(validate_arguments(&json!({"items": [1, "two"]}), &schema).is_err());
    }

    #[test]
    fn empty_schema_accepts_anything() {
        assert!(validate_arguments(&Value::Null, &json!({})).is_ok());
    }

    #[test]
    fn malformed_schema_is_reported() {
        let err = validate_arguments(&json!({}), &json!({"type": 12})).unwrap_err();
        assert!(err.starts_with("invalid JSON schema"), "{err}");
    }

    #[test]
    fn validate_json_handles_empty_and_broken_text() {
        assert_eq!(validate_json("  ", &foo_bar()).unwrap_err(), "empty json");
        assert!(validate_json(r#"{"foo":"#, &foo_bar()).unwrap_err().starts_with("invalid json"));
        assert_eq!(
            validate_json(r#"{"foo":"hi","bar":7}"#, &foo_bar()).unwrap(),
            json!({"foo": "hi", "bar": 7})
        );
    }
}
