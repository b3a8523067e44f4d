// JSON status document -> snapshot tree.
// Understands MongoDB extended JSON wrappers ($date, $numberLong, ...) so server-status style
// documents keep their timestamps and 64-bit counters.

use chrono::{DateTime, Utc};
use serde_json::{Map, Number};
use std::collections::BTreeMap;

use crate::error::CaptureError;
use crate::models::{Scalar, Snapshot, Value};

/// Top level must be a JSON object.
pub fn snapshot_from_json(doc: serde_json::Value) -> Result<Snapshot, CaptureError> {
    match value_from_json(doc) {
        Value::Mapping(m) => Ok(m),
        Value::Scalar(_) => Err(CaptureError::Decode(
            "status document is not a JSON object".into(),
        )),
    }
}

pub fn value_from_json(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Scalar(Scalar::Null),
        serde_json::Value::Bool(b) => Value::Scalar(Scalar::Bool(b)),
        serde_json::Value::Number(n) => Value::Scalar(number(&n)),
        serde_json::Value::String(s) => Value::Scalar(text_or_timestamp(s)),
        serde_json::Value::Array(items) => Value::Mapping(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), value_from_json(item)))
                .collect(),
        ),
        serde_json::Value::Object(obj) => match extended(&obj) {
            Some(s) => Value::Scalar(s),
            None => Value::Mapping(
                obj.into_iter()
                    .map(|(k, v)| (k, value_from_json(v)))
                    .collect::<BTreeMap<_, _>>(),
            ),
        },
    }
}

fn number(n: &Number) -> Scalar {
    if let Some(i) = n.as_i64() {
        Scalar::Int(i)
    } else {
        // u64 beyond i64::MAX, or a float
        Scalar::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn text_or_timestamp(s: String) -> Scalar {
    match DateTime::parse_from_rfc3339(&s) {
        Ok(t) => Scalar::Timestamp(t.with_timezone(&Utc)),
        Err(_) => Scalar::Text(s),
    }
}

/// Single-key extended JSON wrappers. `None` means "treat as a plain object".
fn extended(obj: &Map<String, serde_json::Value>) -> Option<Scalar> {
    if obj.len() != 1 {
        return None;
    }
    let (key, inner) = obj.iter().next()?;
    match key.as_str() {
        "$date" => date(inner),
        "$numberLong" | "$numberInt" => inner.as_str()?.parse().ok().map(Scalar::Int),
        "$numberDouble" => inner.as_str()?.parse().ok().map(Scalar::Float),
        _ => None,
    }
}

fn date(inner: &serde_json::Value) -> Option<Scalar> {
    let ms = match inner {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => {
            return DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| Scalar::Timestamp(t.with_timezone(&Utc)));
        }
        serde_json::Value::Object(o) => o.get("$numberLong")?.as_str()?.parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(ms).map(Scalar::Timestamp)
}
