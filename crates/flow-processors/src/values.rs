//! Shared value resolution and coercion helpers
//!
//! Processors receive a handle-to-value input mapping and a JSON
//! configuration blob. The helpers here define, in one place, how a single
//! working value is resolved from that mapping and how loosely typed JSON
//! values coerce to numbers, strings, and booleans. Every processor uses
//! these so the coercion rules stay consistent across node types.

use std::collections::{BTreeMap, HashMap};

use flow_engine::{EngineError, Result, DEFAULT_HANDLE};
use serde_json::Value;

/// Resolve a single working value from a node's input mapping
///
/// Prefers the default handle when present (even when it holds a falsy
/// value), then the sole populated handle, else the whole mapping as an
/// object with sorted keys. An empty mapping resolves to null.
pub fn resolve_single(inputs: &HashMap<String, Value>) -> Value {
    if inputs.is_empty() {
        return Value::Null;
    }
    if let Some(value) = inputs.get(DEFAULT_HANDLE) {
        return value.clone();
    }
    if inputs.len() == 1 {
        if let Some(value) = inputs.values().next() {
            return value.clone();
        }
    }
    let ordered: BTreeMap<&String, &Value> = inputs.iter().collect();
    Value::Object(
        ordered
            .into_iter()
            .map(|(handle, value)| (handle.clone(), value.clone()))
            .collect(),
    )
}

/// Resolve one dot-path step against a value
///
/// Objects are indexed by key and arrays by numeric segment. `length` is a
/// virtual field on arrays and strings. Anything unresolvable is null.
fn step(value: &Value, segment: &str) -> Value {
    match value {
        Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
        Value::Array(items) => {
            if segment == "length" {
                return Value::from(items.len());
            }
            segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or(Value::Null)
        }
        Value::String(text) if segment == "length" => Value::from(text.chars().count()),
        _ => Value::Null,
    }
}

/// Extract a dot-separated field path from a value
///
/// An empty path returns the value unchanged; missing segments resolve to
/// null rather than failing.
pub fn extract_path(value: &Value, path: &str) -> Value {
    if path.is_empty() {
        return value.clone();
    }
    path.split('.').fold(value.clone(), |acc, segment| step(&acc, segment))
}

/// Walk a pre-split field path, used by the expression evaluator
pub fn walk_path<'a, I>(value: &Value, segments: I) -> Value
where
    I: IntoIterator<Item = &'a str>,
{
    segments
        .into_iter()
        .fold(value.clone(), |acc, segment| step(&acc, segment))
}

/// Loose numeric coercion
///
/// Numbers pass through, numeric strings parse, booleans map to 1/0, and
/// null maps to 0. Arrays and objects do not coerce.
pub fn as_f64_lossy(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) => Some(0.0),
        Value::Null => Some(0.0),
        _ => None,
    }
}

/// Coerce a value to a string: strings pass through, everything else is
/// rendered as compact JSON
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness: null, false, zero, and the empty string are falsy;
/// everything else, including empty arrays and objects, is truthy
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Equality with numeric unification, so `1` and `1.0` compare equal
/// while values of different types otherwise do not
pub fn value_eq(a: &Value, b: &Value) -> bool {
    if let (Value::Number(x), Value::Number(y)) = (a, b) {
        return x.as_f64() == y.as_f64();
    }
    a == b
}

/// Wrap a computed float as a JSON number
///
/// Integral results collapse to integers so arithmetic on whole numbers
/// stays whole. Non-finite results have no JSON form and become null.
pub fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Require a non-null value for a mandatory input port
pub fn require_value(value: Value, port: &str) -> Result<Value> {
    if value.is_null() {
        return Err(EngineError::missing_input(port));
    }
    Ok(value)
}

/// Deserialize a node's configuration, treating a null blob as defaults
pub fn parse_config<T>(config: &Value, node_id: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| {
        EngineError::configuration(format!("node '{}' has an invalid configuration: {}", node_id, e))
    })
}
