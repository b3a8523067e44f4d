// Range queries: one attribute path over a time window, with min/max and a chart time axis.

pub mod time_axis;

use crate::catalog::AttributeCatalog;
use crate::error::QueryError;
use crate::models::{AttributePath, Record, Scalar, Value, resolve};
use crate::store::SnapshotStore;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::instrument;

pub use time_axis::{TimeAxis, TimeUnit, scale};

/// Format accepted for query bounds besides RFC 3339 (always UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Window used when the caller gives no bounds.
pub const DEFAULT_WINDOW_SECS: i64 = 3600;

/// A resolved leaf, ready for charting. Timestamps arrive as epoch seconds.
///
/// Integers are carried as `f64`: counters above 2^53 round to the nearest representable value,
/// so min/max over such counters are exact only to about 16 significant digits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Number(f64),
    Text(String),
}

impl QueryValue {
    /// `None` for nulls; those records are skipped like missing paths.
    pub fn from_scalar(s: &Scalar) -> Option<Self> {
        match s {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(QueryValue::Number(if *b { 1.0 } else { 0.0 })),
            Scalar::Int(i) => Some(QueryValue::Number(*i as f64)),
            Scalar::Float(f) => Some(QueryValue::Number(*f)),
            Scalar::Timestamp(t) => Some(QueryValue::Number(
                t.timestamp_millis() as f64 / 1000.0,
            )),
            Scalar::Text(t) => Some(QueryValue::Text(t.clone())),
        }
    }

    /// Numbers order numerically and all sort before text.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (QueryValue::Number(a), QueryValue::Number(b)) => a.total_cmp(b),
            (QueryValue::Number(_), QueryValue::Text(_)) => Ordering::Less,
            (QueryValue::Text(_), QueryValue::Number(_)) => Ordering::Greater,
            (QueryValue::Text(a), QueryValue::Text(b)) => a.cmp(b),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Number(n) => Some(*n),
            QueryValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: QueryValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub attr: AttributePath,
    pub t1: DateTime<Utc>,
    pub t2: DateTime<Utc>,
    pub points: Vec<DataPoint>,
    /// 0 when the window holds no values.
    pub min: QueryValue,
    /// 0 when the window holds no values.
    pub max: QueryValue,
    pub axis: TimeAxis,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Min/max, or `None` for an empty window (the fields then hold the 0 sentinel).
    pub fn bounds(&self) -> Option<(&QueryValue, &QueryValue)> {
        if self.points.is_empty() {
            None
        } else {
            Some((&self.min, &self.max))
        }
    }
}

/// Read side of the monitor: catalog lookups and range queries over the shared store.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<SnapshotStore>,
    catalog: Arc<AttributeCatalog>,
}

impl QueryEngine {
    pub fn new(store: Arc<SnapshotStore>, catalog: Arc<AttributeCatalog>) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> Vec<AttributePath> {
        self.catalog.paths().iter().cloned().collect()
    }

    #[instrument(skip(self), fields(operation = "query"))]
    pub fn query(
        &self,
        attr: &str,
        t1: DateTime<Utc>,
        t2: DateTime<Utc>,
    ) -> Result<QueryResult, QueryError> {
        let path: AttributePath = attr.parse().map_err(|_| QueryError::BadAttribute {
            attr: attr.to_string(),
        })?;
        if !self.catalog.contains(&path) {
            return Err(QueryError::BadAttribute {
                attr: attr.to_string(),
            });
        }
        let axis = scale(t1, t2)?;

        let window = self.store.range(t1, t2);
        let points: Vec<DataPoint> = window
            .iter()
            .filter_map(|record| resolve_point(record, &path))
            .collect();
        let (min, max) = min_max(points.iter().map(|p| &p.value));
        tracing::debug!(
            records = window.len(),
            points = points.len(),
            "query resolved"
        );

        Ok(QueryResult {
            attr: path,
            t1,
            t2,
            points,
            min,
            max,
            axis,
        })
    }
}

/// Value of `path` in `record`, or `None` when the record lacks it (heterogeneous snapshots).
pub fn resolve_point(record: &Record, path: &AttributePath) -> Option<DataPoint> {
    let value = match resolve(record.snapshot(), path.segments())? {
        Value::Scalar(s) => QueryValue::from_scalar(s)?,
        Value::Mapping(_) => return None,
    };
    Some(DataPoint {
        timestamp: record.captured_at(),
        value,
    })
}

/// Single pass running min/max. An empty input yields `(0, 0)`.
pub fn min_max<'a, I>(values: I) -> (QueryValue, QueryValue)
where
    I: IntoIterator<Item = &'a QueryValue>,
{
    let mut iter = values.into_iter();
    let Some(first) = iter.next() else {
        return (QueryValue::Number(0.0), QueryValue::Number(0.0));
    };
    let (mut min, mut max) = (first, first);
    for v in iter {
        if v.total_cmp(min) == Ordering::Less {
            min = v;
        }
        if v.total_cmp(max) == Ordering::Greater {
            max = v;
        }
    }
    (min.clone(), max.clone())
}

/// Parses `YYYY-MM-DD HH:MM:SS` (UTC) or RFC 3339.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, QueryError> {
    let s = s.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| QueryError::BadTimestamp(s.to_string()))
}

/// The last [`DEFAULT_WINDOW_SECS`] seconds ending at `now`.
pub fn default_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - TimeDelta::seconds(DEFAULT_WINDOW_SECS), now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_max_mixed_values() {
        let vals = [
            QueryValue::Number(3.0),
            QueryValue::Number(-1.0),
            QueryValue::Text("b".into()),
            QueryValue::Text("a".into()),
        ];
        let (min, max) = min_max(vals.iter());
        assert_eq!(min, QueryValue::Number(-1.0));
        assert_eq!(max, QueryValue::Text("b".into()));
    }

    #[test]
    fn min_max_empty_is_zero() {
        let (min, max) = min_max(std::iter::empty());
        assert_eq!(min, QueryValue::Number(0.0));
        assert_eq!(max, QueryValue::Number(0.0));
    }

    #[test]
    fn parse_timestamp_formats() {
        let a = parse_timestamp("2024-01-02 03:04:05").unwrap();
        let b = parse_timestamp("2024-01-02T03:04:05Z").unwrap();
        assert_eq!(a, b);
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(QueryError::BadTimestamp(_))
        ));
    }
}
