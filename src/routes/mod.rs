// HTTP + WebSocket routes: a thin shell over the query engine and store.

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::models::Record;
use crate::query::QueryEngine;
use crate::sampler::SamplerStats;
use crate::store::SnapshotStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: QueryEngine,
    pub(crate) store: Arc<SnapshotStore>,
    pub(crate) stats: Arc<SamplerStats>,
    pub(crate) live_tx: broadcast::Sender<Arc<Record>>,
    pub(crate) target: Arc<str>,
}

/// Handles the web layer needs; constructed once in main (or per test).
pub struct AppDeps {
    pub engine: QueryEngine,
    pub store: Arc<SnapshotStore>,
    pub stats: Arc<SamplerStats>,
    pub live_tx: broadcast::Sender<Arc<Record>>,
    /// Monitored target, shown on the index.
    pub target: String,
}

pub fn app(deps: AppDeps) -> Router {
    let state = AppState {
        engine: deps.engine,
        store: deps.store,
        stats: deps.stats,
        live_tx: deps.live_tx,
        target: deps.target.into(),
    };
    Router::new()
        .route("/", get(http::index_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/catalog", get(http::catalog_handler)) // GET /api/catalog
        .route("/api/query", get(http::query_handler)) // GET /api/query?attr=&t1=&t2=
        .route("/api/server", get(http::server_handler)) // GET /api/server
        .route("/api/status", get(http::status_handler)) // GET /api/status
        .route("/ws/latest", get(ws::ws_latest)) // WS /ws/latest
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
