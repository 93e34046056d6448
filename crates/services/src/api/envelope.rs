use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// Decode a list body that is either a bare array or an object wrapping one.
///
/// Wrapped bodies are looked up under `key`, then `data`.
///
/// # Errors
///
/// Returns `ApiError::Decode` when no array is found or an element does not
/// match `T`.
pub fn decode_list<T: DeserializeOwned>(body: Value, key: &str) -> Result<Vec<T>, ApiError> {
    let items = match body {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map
            .remove(key)
            .or_else(|| map.remove("data"))
            .filter(Value::is_array)
            .ok_or_else(|| ApiError::Decode(format!("expected an array under `{key}`")))?,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ApiError::Decode(format!(
                "expected an array, got {}",
                kind(&other)
            )));
        }
    };
    serde_json::from_value(items).map_err(|e| ApiError::Decode(e.to_string()))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
