// Background sampler: capture a snapshot every interval and append it to the store.
// Persistence runs in a dedicated journal writer task (channel), so a slow disk never delays
// sampling.

use crate::catalog::AttributeCatalog;
use crate::journal::Journal;
use crate::models::Record;
use crate::source::SnapshotSource;
use crate::store::SnapshotStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tracing::Instrument;

/// Rate limit for "no receivers" logging (avoid logging every tick when no one is on /ws/latest)
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Channel capacity for the journal writer (backpressure if the writer falls behind).
pub fn writer_channel_capacity(flush_rate: u64) -> usize {
    (flush_rate as usize * 2).max(32)
}

/// Counters shared between the sampler, the journal writer and /api/status.
#[derive(Debug, Default)]
pub struct SamplerStats {
    captures_total: AtomicU64,
    capture_failures_total: AtomicU64,
    evicted_total: AtomicU64,
    journaled_total: AtomicU64,
    journal_dropped_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerCounters {
    pub captures_total: u64,
    pub capture_failures_total: u64,
    pub evicted_total: u64,
    pub journaled_total: u64,
    pub journal_dropped_total: u64,
}

impl SamplerStats {
    pub fn counters(&self) -> SamplerCounters {
        SamplerCounters {
            captures_total: self.captures_total.load(Ordering::Relaxed),
            capture_failures_total: self.capture_failures_total.load(Ordering::Relaxed),
            evicted_total: self.evicted_total.load(Ordering::Relaxed),
            journaled_total: self.journaled_total.load(Ordering::Relaxed),
            journal_dropped_total: self.journal_dropped_total.load(Ordering::Relaxed),
        }
    }
}

/// Source, store, channels, and shutdown for the sampler.
pub struct SamplerDeps<S> {
    pub source: Arc<S>,
    pub store: Arc<SnapshotStore>,
    pub catalog: Arc<AttributeCatalog>,
    pub live_tx: broadcast::Sender<Arc<Record>>,
    pub journal_tx: Option<mpsc::Sender<Arc<Record>>>,
    pub stats: Arc<SamplerStats>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct SamplerConfig {
    pub interval: Duration,
    /// How often to log sampler stats (real time).
    pub stats_log_interval: Duration,
}

/// Writer config: batching for the journal writer task.
pub struct JournalWriterConfig {
    pub flush_rate: u64,
    pub flush_interval_secs: u64,
}

/// Spawns the sampling loop. A failed capture is logged and skipped; the loop only ends when
/// `shutdown_rx` fires (or its sender is dropped). At most one capture is in flight: a slow
/// capture delays the next tick instead of queueing missed ones.
pub fn spawn<S: SnapshotSource>(
    deps: SamplerDeps<S>,
    config: SamplerConfig,
) -> tokio::task::JoinHandle<()> {
    let SamplerDeps {
        source,
        store,
        catalog,
        live_tx,
        journal_tx,
        stats,
        mut shutdown_rx,
    } = deps;
    let SamplerConfig {
        interval: sample_interval,
        stats_log_interval,
    } = config;

    let sampler_span = tracing::span!(
        tracing::Level::DEBUG,
        "sampler",
        interval_ms = sample_interval.as_millis() as u64,
        source = %source.describe()
    );

    let task = async move {
        let mut tick = interval(sample_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick completes immediately; skip it so the first log line has data
        stats_log_tick.tick().await;

        let mut last_no_receivers_log: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_rx => {
                    tracing::debug!("Sampler shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let snapshot = match source.capture().await {
                        Ok(s) => s,
                        Err(e) => {
                            stats.capture_failures_total.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(
                                error = %e,
                                operation = "capture",
                                "snapshot capture failed; skipping tick"
                            );
                            continue;
                        }
                    };
                    let record = match Record::new(Utc::now(), snapshot) {
                        Ok(r) => r,
                        Err(e) => {
                            stats.capture_failures_total.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(error = %e, operation = "encode", "snapshot encode failed");
                            continue;
                        }
                    };
                    if !catalog.is_ready() {
                        catalog.prime(record.snapshot());
                    }

                    let outcome = store.append(record);
                    stats.captures_total.fetch_add(1, Ordering::Relaxed);
                    stats.evicted_total.fetch_add(outcome.evicted as u64, Ordering::Relaxed);
                    let Some(stored) = store.latest() else {
                        continue;
                    };

                    if live_tx.send(stored.clone()).is_err() {
                        let should_log = last_no_receivers_log
                            .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
                        if should_log {
                            tracing::debug!(
                                operation = "broadcast_record",
                                "No live clients; broadcast channel has no receivers"
                            );
                            last_no_receivers_log = Some(Instant::now());
                        }
                    }
                    // never wait on the writer here: a stalled disk must not delay ticks or shutdown
                    if let Some(journal_tx) = &journal_tx {
                        match journal_tx.try_send(stored) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(record)) => {
                                stats.journal_dropped_total.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(
                                    operation = "journal_send",
                                    captured_at = %record.captured_at(),
                                    "journal writer backlogged; record not journaled"
                                );
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                tracing::debug!("Journal writer channel closed");
                            }
                        }
                    }
                }
                _ = stats_log_tick.tick() => {
                    let counters = stats.counters();
                    let store_stats = store.stats();
                    tracing::info!(
                        captures_total = counters.captures_total,
                        capture_failures_total = counters.capture_failures_total,
                        evicted_total = counters.evicted_total,
                        journaled_total = counters.journaled_total,
                        journal_dropped_total = counters.journal_dropped_total,
                        records = store_stats.records,
                        bytes = store_stats.bytes,
                        capacity_bytes = store_stats.capacity_bytes,
                        "sampler stats"
                    );
                }
            }
        }
    };
    tokio::spawn(task.instrument(sampler_span))
}

/// Spawns the task that receives records from the sampler and flushes them to the journal.
/// Flushes when buffer len >= flush_rate, or every flush_interval_secs, or when the channel
/// closes. After each flush, rows older than the store's oldest record are pruned.
pub fn spawn_journal_writer(
    mut journal_rx: mpsc::Receiver<Arc<Record>>,
    journal: Arc<Journal>,
    store: Arc<SnapshotStore>,
    config: JournalWriterConfig,
    stats: Arc<SamplerStats>,
) -> tokio::task::JoinHandle<()> {
    let flush_interval = Duration::from_secs(config.flush_interval_secs);
    tokio::spawn(async move {
        let mut buffer: Vec<Arc<Record>> = Vec::new();
        let mut flush_tick = interval(flush_interval);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = journal_rx.recv() => {
                    match result {
                        Some(record) => {
                            buffer.push(record);
                            if buffer.len() >= config.flush_rate as usize
                                && let Err(e) = flush_buffer(&journal, &store, &mut buffer, &stats).await
                            {
                                tracing::warn!(error = %e, "journal writer: flush failed");
                            }
                        }
                        None => break,
                    }
                }
                _ = flush_tick.tick() => {
                    if let Err(e) = flush_buffer(&journal, &store, &mut buffer, &stats).await {
                        tracing::warn!(error = %e, "journal writer: flush failed");
                    }
                }
            }
        }
        if let Err(e) = flush_buffer(&journal, &store, &mut buffer, &stats).await {
            tracing::warn!(error = %e, "journal writer: final flush failed");
        }
        tracing::debug!("Journal writer shutting down");
    })
}

async fn flush_buffer(
    journal: &Journal,
    store: &SnapshotStore,
    buffer: &mut Vec<Arc<Record>>,
    stats: &SamplerStats,
) -> anyhow::Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }
    let n = buffer.len();
    journal.append_batch(buffer).await?;
    stats.journaled_total.fetch_add(n as u64, Ordering::Relaxed);
    buffer.clear();

    let pruned = match store.oldest() {
        Some(oldest) => journal.prune_before(oldest.captured_at()).await?,
        None => 0,
    };
    tracing::debug!(
        operation = "flush_journal",
        records_count = n,
        pruned,
        "Journal flushed"
    );
    Ok(())
}
