// Shared test helpers
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use statwatch::error::CaptureError;
use statwatch::models::{Record, Snapshot, Value, mapping};
use statwatch::source::SnapshotSource;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

/// A status document shaped like a database server's: two- and three-level leaves plus a
/// top-level scalar.
pub fn sample(n: i64) -> Snapshot {
    let mut s = Snapshot::new();
    s.insert("host".into(), Value::from("db1"));
    s.insert(
        "mem".into(),
        mapping([("resident", Value::from(n)), ("virtual", Value::from(n * 2))]),
    );
    s.insert(
        "opcounters".into(),
        mapping([("insert", Value::from(n)), ("query", Value::from(n * 10))]),
    );
    s.insert(
        "wiredTiger".into(),
        mapping([(
            "cache",
            mapping([("bytes currently in the cache", Value::from(n * 1024))]),
        )]),
    );
    s
}

pub fn record(secs: i64, n: i64) -> Record {
    Record::new(ts(secs), sample(n)).unwrap()
}

/// Replays a script of captures: `Some` yields that snapshot, `None` fails the tick.
/// Once the script runs out every capture succeeds with `sample(0)`.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Option<Snapshot>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Option<Snapshot>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for ScriptedSource {
    async fn capture(&self) -> Result<Snapshot, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Some(snapshot)) => Ok(snapshot),
            Some(None) => Err(CaptureError::Decode("scripted failure".into())),
            None => Ok(sample(0)),
        }
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}
