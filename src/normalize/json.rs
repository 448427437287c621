//! JSON candidate decoder.
//!
//! Unwrap precedence: an object that carries the sender field is used
//! directly; otherwise a nested `data` object is unwrapped one level;
//! otherwise the top-level object is taken as-is.

use serde_json::{Map, Value};

use super::FieldMap;

pub(super) fn decode(body: &str) -> Option<FieldMap> {
    let value: Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;

    let chosen = if obj.contains_key("FromUserName") {
        obj
    } else if let Some(data) = obj.get("data").and_then(Value::as_object) {
        data
    } else {
        obj
    };

    Some(flatten(chosen))
}

/// Scalar values are stringified; nested arrays/objects are dropped.
fn flatten(obj: &Map<String, Value>) -> FieldMap {
    obj.iter()
        .filter_map(|(key, value)| scalar(value).map(|s| (key.clone(), s)))
        .collect()
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
