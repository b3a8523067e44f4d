// Timestamped record + flat leaf encoding.
// A snapshot tree is flattened into (segments, leaf) pairs and wincode-encoded; the encoded
// length drives store capacity accounting and the same bytes are what the journal persists.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use wincode::{SchemaRead, SchemaWrite};

use super::value::{Scalar, Snapshot, Value};

/// Bytes charged for the capture timestamp on top of the encoded snapshot.
const TIMESTAMP_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, SchemaRead, SchemaWrite)]
pub enum FlatValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Epoch milliseconds.
    Timestamp(i64),
    Text(String),
    EmptyMapping,
}

#[derive(Debug, Clone, PartialEq, SchemaRead, SchemaWrite)]
pub struct FlatLeaf {
    pub path: Vec<String>,
    pub value: FlatValue,
}

/// One captured snapshot and the wall-clock time it was taken. Immutable once built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    captured_at: DateTime<Utc>,
    snapshot: Arc<Snapshot>,
    #[serde(skip)]
    encoded_len: usize,
}

impl Record {
    pub fn new(captured_at: DateTime<Utc>, snapshot: Snapshot) -> anyhow::Result<Self> {
        let payload = encode_snapshot(&snapshot)?;
        Ok(Self {
            captured_at,
            snapshot: Arc::new(snapshot),
            encoded_len: payload.len() + TIMESTAMP_LEN,
        })
    }

    /// Rebuilds a record from a journal row (epoch ms + wincode payload).
    pub fn decode(captured_at_ms: i64, payload: &[u8]) -> anyhow::Result<Self> {
        let captured_at = DateTime::from_timestamp_millis(captured_at_ms)
            .ok_or_else(|| anyhow::anyhow!("captured_at out of range: {}", captured_at_ms))?;
        let leaves: Vec<FlatLeaf> = wincode::deserialize(payload)
            .map_err(|e| anyhow::anyhow!("wincode deserialize snapshot: {}", e))?;
        let snapshot = unflatten(leaves)?;
        Ok(Self {
            captured_at,
            snapshot: Arc::new(snapshot),
            encoded_len: payload.len() + TIMESTAMP_LEN,
        })
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub(crate) fn clamp_not_before(&mut self, floor: DateTime<Utc>) {
        self.captured_at = self.captured_at.max(floor);
    }

    /// Bytes this record counts against the store budget.
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Wincode payload for persistence.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        encode_snapshot(&self.snapshot)
    }
}

pub fn encode_snapshot(snapshot: &Snapshot) -> anyhow::Result<Vec<u8>> {
    let leaves = flatten(snapshot);
    wincode::serialize(&leaves).map_err(|e| anyhow::anyhow!("wincode serialize snapshot: {}", e))
}

/// Every leaf of the tree, depth-first in key order.
pub fn flatten(snapshot: &Snapshot) -> Vec<FlatLeaf> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    flatten_into(snapshot, &mut prefix, &mut out);
    out
}

fn flatten_into(map: &BTreeMap<String, Value>, prefix: &mut Vec<String>, out: &mut Vec<FlatLeaf>) {
    for (key, value) in map {
        prefix.push(key.clone());
        match value {
            Value::Mapping(inner) if inner.is_empty() => out.push(FlatLeaf {
                path: prefix.clone(),
                value: FlatValue::EmptyMapping,
            }),
            Value::Mapping(inner) => flatten_into(inner, prefix, out),
            Value::Scalar(s) => out.push(FlatLeaf {
                path: prefix.clone(),
                value: scalar_to_flat(s),
            }),
        }
        prefix.pop();
    }
}

fn scalar_to_flat(s: &Scalar) -> FlatValue {
    match s {
        Scalar::Null => FlatValue::Null,
        Scalar::Bool(b) => FlatValue::Bool(*b),
        Scalar::Int(i) => FlatValue::Int(*i),
        Scalar::Float(f) => FlatValue::Float(*f),
        Scalar::Timestamp(t) => FlatValue::Timestamp(t.timestamp_millis()),
        Scalar::Text(t) => FlatValue::Text(t.clone()),
    }
}

fn flat_to_value(v: FlatValue) -> anyhow::Result<Value> {
    Ok(match v {
        FlatValue::Null => Value::Scalar(Scalar::Null),
        FlatValue::Bool(b) => Value::Scalar(Scalar::Bool(b)),
        FlatValue::Int(i) => Value::Scalar(Scalar::Int(i)),
        FlatValue::Float(f) => Value::Scalar(Scalar::Float(f)),
        FlatValue::Timestamp(ms) => Value::Scalar(Scalar::Timestamp(
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| anyhow::anyhow!("timestamp leaf out of range: {}", ms))?,
        )),
        FlatValue::Text(t) => Value::Scalar(Scalar::Text(t)),
        FlatValue::EmptyMapping => Value::Mapping(BTreeMap::new()),
    })
}

/// Inverse of [`flatten`]. Fails if two leaves disagree about the tree shape.
pub fn unflatten(leaves: Vec<FlatLeaf>) -> anyhow::Result<Snapshot> {
    let mut root = Snapshot::new();
    for leaf in leaves {
        let Some((last, parents)) = leaf.path.split_last() else {
            anyhow::bail!("flat leaf with empty path");
        };
        let mut node = &mut root;
        for seg in parents {
            let child = node
                .entry(seg.clone())
                .or_insert_with(|| Value::Mapping(BTreeMap::new()));
            node = match child {
                Value::Mapping(m) => m,
                Value::Scalar(_) => anyhow::bail!("leaf path {:?} crosses a scalar", leaf.path),
            };
        }
        node.insert(last.clone(), flat_to_value(leaf.value)?);
    }
    Ok(root)
}
