use anyhow::Result;
use statwatch::*;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

use statwatch::source::SnapshotSource;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let store = Arc::new(store::SnapshotStore::new(app_config.store.capacity_bytes)?);
    let stats = Arc::new(sampler::SamplerStats::default());

    let mut journal_tx = None;
    let mut writer_handle = None;
    let mut maintenance_handle = None;
    if app_config.journal.enabled {
        let journal = Arc::new(journal::Journal::connect(&app_config.journal.path).await?);
        journal.init().await?;

        let restored = journal.load_recent(store.capacity_bytes()).await?;
        let restored_count = restored.len();
        for record in restored {
            store.append(record);
        }
        tracing::info!(
            records = restored_count,
            bytes = store.bytes(),
            path = %app_config.journal.path,
            "store warmed from journal"
        );

        let (tx, rx) = mpsc::channel(sampler::writer_channel_capacity(
            app_config.journal.flush_rate,
        ));
        journal_tx = Some(tx);
        writer_handle = Some(sampler::spawn_journal_writer(
            rx,
            journal.clone(),
            store.clone(),
            sampler::JournalWriterConfig {
                flush_rate: app_config.journal.flush_rate,
                flush_interval_secs: app_config.journal.flush_interval_secs,
            },
            stats.clone(),
        ));
        let schedule = maintenance::VacuumSchedule::from_config(&app_config.journal)?;
        maintenance_handle = Some(maintenance::spawn(journal, schedule));
    }

    let source = Arc::new(source::Source::from_config(&app_config.source)?);
    let target = source.describe();
    let catalog = Arc::new(catalog::AttributeCatalog::new(store.clone()));
    let engine = query::QueryEngine::new(store.clone(), catalog.clone());
    let (live_tx, _) = broadcast::channel(app_config.sampling.broadcast_capacity);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let sampler_handle = sampler::spawn(
        sampler::SamplerDeps {
            source,
            store: store.clone(),
            catalog,
            live_tx: live_tx.clone(),
            journal_tx,
            stats: stats.clone(),
            shutdown_rx,
        },
        sampler::SamplerConfig {
            interval: Duration::from_secs(app_config.sampling.interval_secs),
            stats_log_interval: Duration::from_secs(app_config.sampling.stats_log_interval_secs),
        },
    );

    let app = routes::app(routes::AppDeps {
        engine,
        store,
        stats,
        live_tx,
        target: target.clone(),
    });
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(source = %target, "Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    // Sampler owns the journal sender; once it exits the writer drains and does a final flush.
    let _ = shutdown_tx.send(());
    let _ = sampler_handle.await;
    if let Some(handle) = writer_handle {
        let _ = handle.await;
    }
    if let Some(handle) = maintenance_handle {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
