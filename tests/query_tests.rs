// Range query tests: resolution, min/max, validation, time axis

mod common;

use common::{record, ts};
use statwatch::catalog::AttributeCatalog;
use statwatch::error::QueryError;
use statwatch::models::{Record, Snapshot, Value, mapping};
use statwatch::query::{QueryEngine, QueryValue, TimeUnit, resolve_point, scale};
use statwatch::store::SnapshotStore;
use std::sync::Arc;

fn engine_with(records: Vec<Record>) -> QueryEngine {
    let store = Arc::new(SnapshotStore::new(1 << 20).unwrap());
    for r in records {
        store.append(r);
    }
    let catalog = Arc::new(AttributeCatalog::new(store.clone()));
    QueryEngine::new(store, catalog)
}

fn mem_snapshot(resident: Value) -> Snapshot {
    let mut s = Snapshot::new();
    s.insert("mem".into(), mapping([("resident", resident)]));
    s
}

#[test]
fn query_resolves_leaf_values() {
    let engine = engine_with(vec![Record::new(ts(10), mem_snapshot(Value::from(120_i64))).unwrap()]);
    let result = engine.query("mem.resident", ts(0), ts(100)).unwrap();
    assert_eq!(result.points.len(), 1);
    assert_eq!(result.points[0].value, QueryValue::Number(120.0));
    assert_eq!(result.points[0].timestamp, ts(10));
}

#[test]
fn query_absent_leaf_is_excluded_not_an_error() {
    let record = Record::new(ts(10), mem_snapshot(Value::from(120_i64))).unwrap();
    assert!(resolve_point(&record, &"mem.virtual".parse().unwrap()).is_none());
    assert_eq!(
        resolve_point(&record, &"mem.resident".parse().unwrap()).map(|p| p.value),
        Some(QueryValue::Number(120.0))
    );

    // catalog built from a fuller sample; the stored record lacks mem.virtual
    let store = Arc::new(SnapshotStore::new(1 << 20).unwrap());
    store.append(record);
    let catalog = Arc::new(AttributeCatalog::new(store.clone()));
    let mut fuller = mem_snapshot(Value::from(1_i64));
    fuller.insert(
        "mem".into(),
        mapping([("resident", Value::from(1_i64)), ("virtual", Value::from(2_i64))]),
    );
    catalog.prime(&fuller);
    let engine = QueryEngine::new(store, catalog);
    let result = engine.query("mem.virtual", ts(0), ts(100)).unwrap();
    assert!(result.points.is_empty());
}

#[test]
fn query_catalog_follows_latest_shape() {
    let mut first = Snapshot::new();
    first.insert(
        "mem".into(),
        mapping([("resident", Value::from(100_i64)), ("virtual", Value::from(400_i64))]),
    );
    let engine = engine_with(vec![
        Record::new(ts(1), first).unwrap(),
        Record::new(ts(2), mem_snapshot(Value::from(120_i64))).unwrap(),
        Record::new(ts(3), mem_snapshot(Value::from(130_i64))).unwrap(),
    ]);
    // catalog comes from the latest record, which has no mem.virtual
    assert!(matches!(
        engine.query("mem.virtual", ts(0), ts(10)),
        Err(QueryError::BadAttribute { .. })
    ));
    let resident = engine.query("mem.resident", ts(0), ts(10)).unwrap();
    assert_eq!(resident.points.len(), 3);
}

#[test]
fn query_heterogeneous_snapshots_are_not_errors() {
    let mut sparse = Snapshot::new();
    sparse.insert("mem".into(), mapping([("bits", Value::from(64_i64))]));
    let engine = engine_with(vec![
        Record::new(ts(1), sparse).unwrap(),
        Record::new(ts(2), mem_snapshot(Value::from(5_i64))).unwrap(),
    ]);
    let result = engine.query("mem.resident", ts(0), ts(10)).unwrap();
    assert_eq!(result.points.len(), 1);
    assert_eq!(result.min, QueryValue::Number(5.0));
    assert_eq!(result.max, QueryValue::Number(5.0));
}

#[test]
fn query_min_max_over_window() {
    let engine = engine_with((1..=6).map(|i| record(i * 10, i)).collect());
    let result = engine.query("opcounters.query", ts(20), ts(50)).unwrap();
    let values: Vec<f64> = result.points.iter().filter_map(|p| p.value.as_f64()).collect();
    assert_eq!(values, vec![20.0, 30.0, 40.0, 50.0]);
    assert_eq!(result.min, QueryValue::Number(20.0));
    assert_eq!(result.max, QueryValue::Number(50.0));
    assert!(!result.is_empty());
}

#[test]
fn query_empty_window_reports_zero_bounds() {
    let engine = engine_with(vec![record(1_000, 1)]);
    let result = engine.query("mem.resident", ts(0), ts(10)).unwrap();
    assert!(result.points.is_empty());
    assert_eq!(result.min, QueryValue::Number(0.0));
    assert_eq!(result.max, QueryValue::Number(0.0));
    assert!(result.is_empty());
    assert!(result.bounds().is_none());
}

#[test]
fn query_rejects_unknown_and_malformed_attributes() {
    let engine = engine_with(vec![record(1, 1)]);
    for attr in ["mem.nope", "mem", "a.b.c.d", "", "mem..resident", "host.x"] {
        assert!(
            matches!(
                engine.query(attr, ts(0), ts(10)),
                Err(QueryError::BadAttribute { .. })
            ),
            "{:?} should be rejected",
            attr
        );
    }
}

#[test]
fn query_rejects_inverted_range() {
    let engine = engine_with(vec![record(1, 1)]);
    assert!(matches!(
        engine.query("mem.resident", ts(10), ts(0)),
        Err(QueryError::BadRange { .. })
    ));
}

#[test]
fn query_before_any_capture_is_bad_attribute() {
    let engine = engine_with(vec![]);
    assert!(engine.catalog().is_empty());
    assert!(matches!(
        engine.query("mem.resident", ts(0), ts(10)),
        Err(QueryError::BadAttribute { .. })
    ));
}

#[test]
fn query_converts_timestamps_and_bools() {
    let when = ts(1_700_000_000);
    let mut s = Snapshot::new();
    s.insert(
        "repl".into(),
        mapping([("lastWrite", Value::from(when)), ("primary", Value::from(true))]),
    );
    let engine = engine_with(vec![Record::new(ts(5), s).unwrap()]);
    let last = engine.query("repl.lastWrite", ts(0), ts(10)).unwrap();
    assert_eq!(last.points[0].value, QueryValue::Number(1_700_000_000.0));
    let primary = engine.query("repl.primary", ts(0), ts(10)).unwrap();
    assert_eq!(primary.points[0].value, QueryValue::Number(1.0));
}

#[test]
fn query_large_counters_round_to_nearest_f64() {
    let big = (1_i64 << 53) + 1;
    let engine = engine_with(vec![
        Record::new(ts(1), mem_snapshot(Value::from(big))).unwrap(),
        Record::new(ts(2), mem_snapshot(Value::from(1_i64 << 53))).unwrap(),
    ]);
    let result = engine.query("mem.resident", ts(0), ts(10)).unwrap();
    let exact = (1_i64 << 53) as f64;
    assert_eq!(result.points[0].value, QueryValue::Number(exact));
    assert_eq!(result.min, QueryValue::Number(exact));
    assert_eq!(result.max, QueryValue::Number(exact));
}

#[test]
fn query_text_values_sort_after_numbers() {
    let engine = engine_with(vec![
        Record::new(ts(1), mem_snapshot(Value::from("n/a"))).unwrap(),
        Record::new(ts(2), mem_snapshot(Value::from(7_i64))).unwrap(),
    ]);
    let result = engine.query("mem.resident", ts(0), ts(10)).unwrap();
    assert_eq!(result.min, QueryValue::Number(7.0));
    assert_eq!(result.max, QueryValue::Text("n/a".into()));
}

#[test]
fn query_keeps_duplicate_timestamps() {
    let engine = engine_with(vec![record(5, 1), record(5, 2)]);
    let result = engine.query("mem.resident", ts(5), ts(5)).unwrap();
    assert_eq!(result.points.len(), 2);
}

#[test]
fn query_axis_matches_window() {
    let engine = engine_with(vec![record(10, 1)]);
    let result = engine.query("mem.resident", ts(0), ts(7200)).unwrap();
    assert_eq!(result.axis.unit, TimeUnit::Hours);
    assert_eq!(result.axis.max, 2.0);
}

#[test]
fn time_axis_two_hours_is_hours() {
    let axis = scale(ts(0), ts(7200)).unwrap();
    assert_eq!(axis.unit, TimeUnit::Hours);
    assert_eq!(axis.min, 0.0);
    assert_eq!(axis.max, 2.0);
}

#[test]
fn time_axis_rejects_inverted_range() {
    assert!(matches!(
        scale(ts(10), ts(0)),
        Err(QueryError::BadRange { .. })
    ));
}
