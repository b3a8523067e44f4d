// Snapshot tree: scalars at the leaves, string-keyed mappings inside.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One leaf reading inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

/// A node of a snapshot: either a leaf or a nested mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Mapping(BTreeMap<String, Value>),
}

/// One captured status reading. Top level is always a mapping.
pub type Snapshot = BTreeMap<String, Value>;

impl Value {
    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            Value::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Mapping(_) => None,
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Scalar(Scalar::Int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Scalar(Scalar::Bool(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Scalar(Scalar::Text(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Scalar(Scalar::Text(v))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Scalar(Scalar::Timestamp(v))
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

/// Walks `segments` down from the top-level mapping.
/// Returns `None` when any segment is missing or descends through a scalar.
pub fn resolve<'a, S: AsRef<str>>(snapshot: &'a Snapshot, segments: &[S]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    let mut node = snapshot.get(first.as_ref())?;
    for seg in rest {
        node = node.as_mapping()?.get(seg.as_ref())?;
    }
    Some(node)
}

/// Builds a mapping value from `(key, value)` pairs. Handy for sources and tests.
pub fn mapping<K, V, I>(entries: I) -> Value
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    Value::Mapping(
        entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut s = Snapshot::new();
        s.insert("host".into(), "db1".into());
        s.insert(
            "mem".into(),
            mapping([("resident", Value::from(120_i64)), ("bits", 64_i64.into())]),
        );
        s.insert(
            "opcounters".into(),
            mapping([("repl", mapping([("insert", 3_i64)]))]),
        );
        s
    }

    #[test]
    fn resolve_two_and_three_segments() {
        let s = sample();
        assert_eq!(
            resolve(&s, &["mem", "resident"]),
            Some(&Value::Scalar(Scalar::Int(120)))
        );
        assert_eq!(
            resolve(&s, &["opcounters", "repl", "insert"]),
            Some(&Value::Scalar(Scalar::Int(3)))
        );
    }

    #[test]
    fn serializes_as_plain_json() {
        let mut s = sample();
        s.insert("note".into(), "2024-05-01T12:00:00Z".into());
        s.insert(
            "localTime".into(),
            DateTime::from_timestamp(1_714_564_800, 0).unwrap().into(),
        );
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["mem"]["resident"], 120);
        assert_eq!(json["opcounters"]["repl"]["insert"], 3);
        assert_eq!(json["note"], "2024-05-01T12:00:00Z");
        assert_eq!(json["localTime"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn resolve_missing_or_through_scalar_is_none() {
        let s = sample();
        assert!(resolve(&s, &["mem", "virtual"]).is_none());
        assert!(resolve(&s, &["host", "name"]).is_none());
        assert!(resolve::<&str>(&s, &[]).is_none());
    }
}
