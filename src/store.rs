// In-memory rolling history with a byte budget.
// Appends go to the tail; once the budget is exceeded the oldest records are dropped from the
// head. Readers get a pointer-copy of the matching window, so scans never hold the lock.

use crate::error::StoreError;
use crate::models::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default budget, matching a 10 MiB capped history.
pub const DEFAULT_CAPACITY_BYTES: usize = 10 * 1024 * 1024;

pub struct SnapshotStore {
    capacity_bytes: usize,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: VecDeque<Arc<Record>>,
    bytes: usize,
    evicted_total: u64,
}

/// What an append did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Head records dropped to get back under budget.
    pub evicted: usize,
    /// False only when the record alone is larger than the whole budget.
    pub retained: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub records: usize,
    pub bytes: usize,
    pub capacity_bytes: usize,
    pub evicted_total: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl SnapshotStore {
    pub fn new(capacity_bytes: usize) -> Result<Self, StoreError> {
        if capacity_bytes == 0 {
            return Err(StoreError::InvalidCapacity);
        }
        Ok(Self {
            capacity_bytes,
            inner: RwLock::new(Inner::default()),
        })
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    // The store is only ever appended to under the write lock, so a poisoned lock still holds
    // a consistent deque.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `record` at the tail, then evicts from the head until the budget holds.
    /// A record stamped earlier than the current tail is moved up to the tail's time so the
    /// history stays sorted.
    pub fn append(&self, mut record: Record) -> AppendOutcome {
        let mut inner = self.write();
        if let Some(tail) = inner.records.back()
            && record.captured_at() < tail.captured_at()
        {
            tracing::debug!(
                captured_at = %record.captured_at(),
                tail = %tail.captured_at(),
                "record stamped before tail; clamping to tail time"
            );
            record.clamp_not_before(tail.captured_at());
        }

        inner.bytes += record.encoded_len();
        inner.records.push_back(Arc::new(record));

        let mut evicted = 0;
        while inner.bytes > self.capacity_bytes {
            let Some(head) = inner.records.pop_front() else {
                break;
            };
            inner.bytes -= head.encoded_len();
            evicted += 1;
        }
        inner.evicted_total += evicted as u64;
        let retained = !inner.records.is_empty();
        if !retained {
            tracing::warn!(
                capacity_bytes = self.capacity_bytes,
                "record larger than store capacity; history cleared"
            );
        }
        AppendOutcome { evicted, retained }
    }

    /// Records with `t1 <= captured_at <= t2`, ascending. Empty when `t1 > t2`.
    pub fn range(&self, t1: DateTime<Utc>, t2: DateTime<Utc>) -> RecordRange {
        if t1 > t2 {
            return RecordRange::default();
        }
        let inner = self.read();
        let start = inner.records.partition_point(|r| r.captured_at() < t1);
        let end = inner.records.partition_point(|r| r.captured_at() <= t2);
        let records: Vec<Arc<Record>> = inner.records.range(start..end).cloned().collect();
        RecordRange {
            records: records.into(),
        }
    }

    /// Every retained record, ascending.
    pub fn all(&self) -> RecordRange {
        self.range(DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC)
    }

    pub fn latest(&self) -> Option<Arc<Record>> {
        self.read().records.back().cloned()
    }

    pub fn oldest(&self) -> Option<Arc<Record>> {
        self.read().records.front().cloned()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    pub fn bytes(&self) -> usize {
        self.read().bytes
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.read();
        StoreStats {
            records: inner.records.len(),
            bytes: inner.bytes,
            capacity_bytes: self.capacity_bytes,
            evicted_total: inner.evicted_total,
            oldest: inner.records.front().map(|r| r.captured_at()),
            newest: inner.records.back().map(|r| r.captured_at()),
        }
    }
}

/// A fixed view of the records in a time window. Later appends and evictions do not affect it;
/// iterate it as many times as needed.
#[derive(Debug, Clone, Default)]
pub struct RecordRange {
    records: Arc<[Arc<Record>]>,
}

impl RecordRange {
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().map(|r| r.as_ref())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecordRange {
    type Item = &'a Arc<Record>;
    type IntoIter = std::slice::Iter<'a, Arc<Record>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
