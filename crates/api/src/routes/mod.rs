pub mod health;
pub mod jobs;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// ```text
/// /ws?token=                   WebSocket job events (owner-scoped)
/// /generate                    create job (POST)
/// /jobs                        list (GET)
/// /jobs/stats                  per-status counts (GET)
/// /jobs/{id}                   get (GET), cancel (DELETE)
/// /jobs/{id}/retry             re-submit a failed job (POST)
/// /metrics                     pipeline counters (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/generate", post(handlers::generate::create_generation))
        .nest("/jobs", jobs::router())
        .route("/metrics", get(handlers::metrics::pipeline_metrics))
}
