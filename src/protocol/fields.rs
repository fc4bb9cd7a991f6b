//! Typed lookups over decoded JSON objects.
//!
//! Every lookup takes an ordered alias list; the first key present with a
//! usable value wins. Missing or mistyped fields yield `None` so callers can
//! apply their own defaults.

use serde_json::{Map, Value};

/// JSON object as decoded from one protocol line.
pub type JsonObject = Map<String, Value>;

/// First value present under any of `keys`, skipping explicit nulls.
#[must_use]
pub fn value<'a>(obj: &'a JsonObject, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|v| !v.is_null())
}

/// First string value present under any of `keys`.
#[must_use]
pub fn string(obj: &JsonObject, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(Value::as_str)
        .map(str::to_string)
}

/// First unsigned integer present under any of `keys`.
///
/// Floats are truncated and negative numbers clamp to zero, since token
/// counters and durations are never negative.
#[must_use]
pub fn unsigned(obj: &JsonObject, keys: &[&str]) -> Option<u64> {
    keys.iter().filter_map(|key| obj.get(*key)).find_map(as_u64)
}

/// First floating point number present under any of `keys`.
#[must_use]
pub fn float(obj: &JsonObject, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(Value::as_f64)
}

/// First boolean present under any of `keys`.
#[must_use]
pub fn boolean(obj: &JsonObject, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(Value::as_bool)
}

/// First object present under any of `keys`.
#[must_use]
pub fn object<'a>(obj: &'a JsonObject, keys: &[&str]) -> Option<&'a JsonObject> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(Value::as_object)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn as_u64(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if value.as_i64().is_some() {
        return Some(0);
    }
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .map(|f| f.max(0.0) as u64)
}
