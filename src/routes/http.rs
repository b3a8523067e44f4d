// GET handlers: index, version, catalog, query, status

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::catalog::server_info;
use crate::error::QueryError;
use crate::query::{QueryResult, default_window, parse_timestamp};
use crate::version::{NAME, VERSION};

/// Rejected query, rendered as 400 + `{"error": ...}`.
pub(super) struct ApiError(QueryError);

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self.0, "query rejected");
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct QueryParams {
    attr: Option<String>,
    t1: Option<String>,
    t2: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    #[serde(flatten)]
    result: QueryResult,
    /// True when no record in the window had the attribute; min/max are then the 0 sentinel.
    empty: bool,
}

/// GET /: service identity, what is being monitored, and the server's own info block.
pub(super) async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
        "target": state.target.as_ref(),
        "server": server_info_body(&state),
    }))
}

/// GET /api/server: top-level scalars of the latest snapshot.
pub(super) async fn server_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(server_info_body(&state))
}

fn server_info_body(state: &AppState) -> serde_json::Value {
    match state.store.latest() {
        Some(record) => serde_json::json!({
            "capturedAt": record.captured_at(),
            "info": server_info(record.snapshot()),
        }),
        None => serde_json::json!({ "capturedAt": null, "info": {} }),
    }
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/catalog: queryable attribute paths.
pub(super) async fn catalog_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.catalog())
}

/// GET /api/query: one attribute over [t1, t2]; both bounds absent means the last hour.
pub(super) async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<impl Serialize>, ApiError> {
    let attr = params.attr.unwrap_or_default();
    // empty bounds (`?t1=&t2=`) count as absent
    let t1 = params.t1.as_deref().filter(|s| !s.trim().is_empty());
    let t2 = params.t2.as_deref().filter(|s| !s.trim().is_empty());
    let (t1, t2) = match (t1, t2) {
        (None, None) => default_window(Utc::now()),
        (Some(t1), Some(t2)) => (parse_timestamp(t1)?, parse_timestamp(t2)?),
        (Some(_), None) => return Err(QueryError::BadTimestamp("t2 is missing".into()).into()),
        (None, Some(_)) => return Err(QueryError::BadTimestamp("t1 is missing".into()).into()),
    };
    let result = state.engine.query(&attr, t1, t2)?;
    let empty = result.is_empty();
    Ok(Json(QueryResponse { result, empty }))
}

/// GET /api/status: store occupancy and sampler counters.
pub(super) async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "store": state.store.stats(),
        "sampler": state.stats.counters(),
        "attributes": state.engine.catalog().len(),
    }))
}
