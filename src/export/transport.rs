//! Transport normalization of result values.
//!
//! Intervals become a plain number of seconds, binary data becomes base64
//! text and non-finite floats become `null`; everything else keeps its JSON
//! equivalent, position for position.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Number, Value as Json};

use crate::db::Value;

/// Converts one value for transport.
pub fn normalize_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => float(*f),
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::String(STANDARD.encode(bytes)),
        Value::Interval { .. } => value.interval_seconds().map_or(Json::Null, float),
    }
}

/// Converts a row for transport, keeping its order and width.
pub fn normalize_row(row: &[Value]) -> Vec<Json> {
    row.iter().map(normalize_value).collect()
}

fn float(f: f64) -> Json {
    Number::from_f64(f).map_or(Json::Null, Json::Number)
}
