//! Typed accessors over untyped JSON
//!
//! Every accessor reports a [`BackupError::Parse`] naming the request path
//! instead of panicking on an unexpected shape.

use crate::error::{BackupError, Result};
use serde_json::{Map, Value};

/// Parse a raw response body
pub fn parse_body(path: &str, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| BackupError::parse(path, format!("invalid JSON: {e}")))
}

pub fn as_object<'a>(value: &'a Value, path: &str, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| BackupError::parse(path, format!("{what} is not an object")))
}

pub fn as_array<'a>(value: &'a Value, path: &str, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| BackupError::parse(path, format!("{what} is not an array")))
}

/// Required string field
pub fn get_str<'a>(map: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a str> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(BackupError::parse(
            path,
            format!("field '{key}' is not a string: {}", type_name(other)),
        )),
        None => Err(BackupError::parse(path, format!("field '{key}' is missing"))),
    }
}

/// Optional string field; `null` and absent are both `None`
pub fn opt_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(|v| v.as_str())
}

/// Required object field
pub fn get_object<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Map<String, Value>> {
    match map.get(key) {
        Some(v) => as_object(v, path, &format!("field '{key}'")),
        None => Err(BackupError::parse(path, format!("field '{key}' is missing"))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
