// SnapshotStore tests: byte budget, FIFO eviction, range windows, concurrent readers

mod common;

use chrono::DateTime;
use common::{record, sample, ts};
use statwatch::models::Record;
use statwatch::store::SnapshotStore;
use std::sync::Arc;

fn times(store: &SnapshotStore) -> Vec<i64> {
    store.all().iter().map(|r| r.captured_at().timestamp()).collect()
}

#[test]
fn store_keeps_newest_three_of_five() {
    let size = record(0, 1).encoded_len();
    let store = SnapshotStore::new(size * 3).unwrap();
    for i in 1..=5 {
        store.append(record(i, i));
    }
    assert_eq!(times(&store), vec![3, 4, 5]);
    assert_eq!(store.bytes(), size * 3);
    assert_eq!(store.stats().evicted_total, 2);
}

#[test]
fn store_bytes_never_exceed_capacity() {
    let size = record(0, 1).encoded_len();
    let capacity = size * 4 + size / 2;
    let store = SnapshotStore::new(capacity).unwrap();
    for i in 0..50 {
        let outcome = store.append(record(i, i));
        assert!(outcome.retained);
        assert!(store.bytes() <= capacity);
        let stored = times(&store);
        // what survives is always a contiguous suffix of what was appended
        let expected: Vec<i64> = ((i + 1 - stored.len() as i64)..=i).collect();
        assert_eq!(stored, expected);
    }
    assert_eq!(store.len(), 4);
}

#[test]
fn store_evicts_as_many_as_needed_for_a_large_record() {
    let small = record(0, 1).encoded_len();
    let store = SnapshotStore::new(small * 4).unwrap();
    for i in 0..4 {
        store.append(record(i, i));
    }
    let mut big = sample(9);
    big.insert(
        "padding".into(),
        statwatch::models::mapping([("blob", "x".repeat(small * 2))]),
    );
    let big = Record::new(ts(10), big).unwrap();
    let big_len = big.encoded_len();
    let outcome = store.append(big);
    assert!(outcome.retained);
    assert!(outcome.evicted >= 2);
    assert!(store.bytes() <= small * 4);
    assert_eq!(store.latest().unwrap().encoded_len(), big_len);
}

#[test]
fn store_oversize_record_clears_history() {
    let store = SnapshotStore::new(16).unwrap();
    let outcome = store.append(record(1, 1));
    assert!(!outcome.retained);
    assert!(store.is_empty());
    assert_eq!(store.bytes(), 0);
}

#[test]
fn store_range_is_inclusive_and_ordered() {
    let store = SnapshotStore::new(1 << 20).unwrap();
    for i in 0..10 {
        store.append(record(i * 10, i));
    }
    let r = store.range(ts(20), ts(50));
    let got: Vec<i64> = r.iter().map(|r| r.captured_at().timestamp()).collect();
    assert_eq!(got, vec![20, 30, 40, 50]);

    let between = store.range(ts(21), ts(29));
    assert!(between.is_empty());

    let inverted = store.range(ts(50), ts(20));
    assert!(inverted.is_empty());

    let all = store.range(DateTime::<chrono::Utc>::MIN_UTC, DateTime::<chrono::Utc>::MAX_UTC);
    assert_eq!(all.len(), 10);
}

#[test]
fn store_range_keeps_duplicate_timestamps() {
    let store = SnapshotStore::new(1 << 20).unwrap();
    store.append(record(5, 1));
    store.append(record(5, 2));
    store.append(record(6, 3));
    assert_eq!(store.range(ts(5), ts(5)).len(), 2);
}

#[test]
fn store_range_is_a_stable_view() {
    let size = record(0, 1).encoded_len();
    let store = SnapshotStore::new(size * 2).unwrap();
    store.append(record(1, 1));
    store.append(record(2, 2));
    let view = store.all();
    for i in 3..10 {
        store.append(record(i, i));
    }
    // restartable: iterating twice yields the same records, untouched by later evictions
    let first: Vec<i64> = view.iter().map(|r| r.captured_at().timestamp()).collect();
    let second: Vec<i64> = (&view)
        .into_iter()
        .map(|r| r.captured_at().timestamp())
        .collect();
    assert_eq!(first, vec![1, 2]);
    assert_eq!(first, second);
    assert_eq!(times(&store), vec![8, 9]);
}

#[test]
fn store_stats_track_oldest_and_newest() {
    let store = SnapshotStore::new(1 << 20).unwrap();
    let empty = store.stats();
    assert_eq!(empty.records, 0);
    assert!(empty.oldest.is_none() && empty.newest.is_none());

    store.append(record(100, 1));
    store.append(record(200, 2));
    let stats = store.stats();
    assert_eq!(stats.records, 2);
    assert_eq!(stats.oldest, Some(ts(100)));
    assert_eq!(stats.newest, Some(ts(200)));
    assert_eq!(stats.capacity_bytes, 1 << 20);
    assert_eq!(store.oldest().unwrap().captured_at(), ts(100));
}

#[test]
fn store_concurrent_readers_see_sorted_windows() {
    let size = record(0, 1).encoded_len();
    let store = Arc::new(SnapshotStore::new(size * 20).unwrap());
    let writer = {
        let store = store.clone();
        std::thread::spawn(move || {
            for i in 0..500 {
                store.append(record(i, i));
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let window = store.all();
                    assert!(window.len() <= 20);
                    let stamps: Vec<_> = window.iter().map(|r| r.captured_at()).collect();
                    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.len(), 20);
    assert_eq!(store.latest().unwrap().captured_at(), ts(499));
}
