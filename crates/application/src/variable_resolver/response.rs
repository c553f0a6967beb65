//! Secret store response validation
//!
//! Store bodies are checked structurally. Every deviation is described in
//! words so it can be reported next to the variable it concerns.

use serde_json::{Map, Value};

/// A variable value read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedVariable {
    /// Store identifier, cached for later lookups.
    pub id: String,

    /// The value, possibly structured.
    pub value: Value,
}

/// Outcome of a successful generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVariable {
    /// Store identifier of the new value.
    pub id: String,

    /// `id` and `name` as returned by the store, for the audit trail.
    pub context: Map<String, Value>,
}

/// Why a generation answer could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GenerationBodyError {
    NotJson,
    MissingId,
}

/// Validates a fetch-by-name body: `{"data": [{"id": .., "value": ..}, ..]}`.
pub(crate) fn parse_data_response(body: &str) -> Result<FetchedVariable, String> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|_| "Invalid JSON response".to_string())?;

    let data = parsed
        .get("data")
        .and_then(Value::as_array)
        .ok_or("Expected data to be an array")?;

    let first = data.first().ok_or("Expected data to be non empty array")?;

    parse_entry(first, "data[0]")
}

/// Validates a fetch-by-id body.
///
/// The store answers with the bare entry; a `data` wrapped answer is accepted too.
pub(crate) fn parse_id_response(body: &str) -> Result<FetchedVariable, String> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|_| "Invalid JSON response".to_string())?;

    if parsed.get("data").is_some() {
        return parse_data_response(body);
    }

    parse_entry(&parsed, "response")
}

/// Validates a generation body: an object carrying an `id`.
pub(crate) fn parse_generation_response(
    body: &str,
) -> Result<GeneratedVariable, GenerationBodyError> {
    let parsed: Value = serde_json::from_str(body).map_err(|_| GenerationBodyError::NotJson)?;
    let object = parsed.as_object().ok_or(GenerationBodyError::NotJson)?;

    let raw_id = object.get("id").ok_or(GenerationBodyError::MissingId)?;
    let id = id_to_string(raw_id).ok_or(GenerationBodyError::MissingId)?;

    let context = ["id", "name"]
        .into_iter()
        .filter_map(|key| object.get(key).map(|v| (key.to_string(), v.clone())))
        .collect();

    Ok(GeneratedVariable { id, context })
}

fn parse_entry(entry: &Value, label: &str) -> Result<FetchedVariable, String> {
    let object = entry
        .as_object()
        .ok_or_else(|| format!("Expected {label} to be an object"))?;

    let id = object
        .get("id")
        .ok_or_else(|| format!("Expected {label} to have key 'id'"))?;
    let value = object
        .get("value")
        .ok_or_else(|| format!("Expected {label} to have key 'value'"))?;

    let id = id_to_string(id)
        .ok_or_else(|| format!("Expected {label} key 'id' to be a string or number"))?;

    Ok(FetchedVariable {
        id,
        value: value.clone(),
    })
}

fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn data_error(body: &Value) -> String {
        parse_data_response(&body.to_string()).err().unwrap_or_default()
    }

    #[test]
    fn test_valid_data_response() {
        let body = json!({"data": [{"id": "7", "name": "/cert", "value": {"ca": "x"}}]});
        assert_eq!(
            parse_data_response(&body.to_string()),
            Ok(FetchedVariable {
                id: "7".into(),
                value: json!({"ca": "x"})
            })
        );
    }

    #[test]
    fn test_numeric_id_and_null_value() {
        let body = json!({"data": [{"id": 3, "value": null}]});
        let fetched = parse_data_response(&body.to_string());
        assert_eq!(fetched.map(|f| (f.id, f.value)), Ok(("3".into(), Value::Null)));
    }

    #[test]
    fn test_malformed_data_responses() {
        assert_eq!(
            parse_data_response("Invalid JSON response").err().as_deref(),
            Some("Invalid JSON response")
        );
        assert_eq!(data_error(&json!({"x": {}})), "Expected data to be an array");
        assert_eq!(
            data_error(&json!({"data": {"value": "x"}})),
            "Expected data to be an array"
        );
        assert_eq!(
            data_error(&json!({"data": []})),
            "Expected data to be non empty array"
        );
        assert_eq!(
            data_error(&json!({"data": [{"name": "name1", "id": "id1", "val": "x"}]})),
            "Expected data[0] to have key 'value'"
        );
        assert_eq!(
            data_error(&json!({"data": [{"value": "x"}]})),
            "Expected data[0] to have key 'id'"
        );
    }

    #[test]
    fn test_data_entry_shape_errors() {
        assert_eq!(
            data_error(&json!({"data": ["x"]})),
            "Expected data[0] to be an object"
        );
        assert_eq!(
            data_error(&json!({"data": [{"id": true, "value": 1}]})),
            "Expected data[0] key 'id' to be a string or number"
        );
    }

    #[test]
    fn test_id_response_bare_entry() {
        let body = json!({"id": "cfg-svr-id", "name": "/boo", "value": "var_val"});
        assert_eq!(
            parse_id_response(&body.to_string()).map(|f| f.value),
            Ok(json!("var_val"))
        );
    }

    #[test]
    fn test_id_response_wrapped_entry() {
        let body = json!({"data": [{"id": "1", "value": 5}]});
        assert_eq!(
            parse_id_response(&body.to_string()).map(|f| f.value),
            Ok(json!(5))
        );
    }

    #[test]
    fn test_generation_response_context() {
        let body = json!({"id": 858, "name": "/d/dep/my_smurf", "value": "abc"});
        let generated = parse_generation_response(&body.to_string());
        assert_eq!(
            generated,
            Ok(GeneratedVariable {
                id: "858".into(),
                context: json!({"id": 858, "name": "/d/dep/my_smurf"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
            })
        );
    }

    #[test]
    fn test_generation_response_errors() {
        assert_eq!(
            parse_generation_response("NOT JSON!!!"),
            Err(GenerationBodyError::NotJson)
        );
        assert_eq!(
            parse_generation_response("[1, 2]"),
            Err(GenerationBodyError::NotJson)
        );
        assert_eq!(
            parse_generation_response(r#"{"name": "x"}"#),
            Err(GenerationBodyError::MissingId)
        );
    }
}
