//! JSON schema helpers.

use schemars::JsonSchema;
use serde_json::Value;

/// Validate `instance` against `schema`, returning every violation joined into one message.
pub fn validate(schema: &Value, instance: &Value) -> Result<(), String> {
    let validator =
        jsonschema::Validator::new(schema).map_err(|e| format!("invalid schema: {}", e))?;
    if validator.is_valid(instance) {
        return Ok(());
    }
    let errors: Vec<String> = validator.iter_errors(instance).map(|e| e.to_string()).collect();
    Err(errors.join("; "))
}

/// Generate a JSON schema for a Rust type.
pub fn schema_for<T: JsonSchema>() -> Value {
    let root = schemars::schema_for!(T);
    serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// Parse a final answer as JSON for structured output validation.
///
/// Accepts the bare JSON document or one wrapped in a single markdown code fence.
pub fn parse_structured(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();
    let body = strip_code_fence(trimmed).unwrap_or(trimmed);
    serde_json::from_str(body).map_err(|e| format!("answer is not valid JSON: {}", e))
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest.strip_suffix("```")?;
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    Some(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0}
            },
            "required": ["name"]
        })
    }

    #[test]
    fn test_valid_instance() {
        assert!(validate(&person_schema(), &json!({"name": "Ada", "age": 36})).is_ok());
    }

    #[test]
    fn test_invalid_instance_reports_errors() {
        let err = validate(&person_schema(), &json!({"age": -1})).unwrap_err();
        assert!(err.contains("name"));
        assert!(err.contains(";"));
    }

    #[test]
    fn test_invalid_schema() {
        let err = validate(&json!({"type": 12}), &json!({})).unwrap_err();
        assert!(err.starts_with("invalid schema"));
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct SearchArgs {
        query: String,
        limit: Option<u32>,
    }

    #[test]
    fn test_schema_for_type() {
        let schema = schema_for::<SearchArgs>();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("query").is_some());
        assert!(validate(&schema, &json!({"query": "rust"})).is_ok());
        assert!(validate(&schema, &json!({"limit": 3})).is_err());
    }

    #[test]
    fn test_parse_structured_plain() {
        assert_eq!(parse_structured(" {\"a\": 1} ").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_parse_structured_fenced() {
        let text = "```json\n{\"a\": 2}\n```";
        assert_eq!(parse_structured(text).unwrap(), json!({"a": 2}));
    }

    #[test]
    fn test_parse_structured_prose() {
        assert!(parse_structured("The answer is 42").is_err());
    }
}
