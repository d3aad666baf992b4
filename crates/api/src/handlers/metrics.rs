use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::middleware::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/metrics
///
/// Per-job-type success, cache-hit, failure and latency counters for the
/// orchestrators running in this process.
pub async fn pipeline_metrics(_auth: AuthUser, State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.metrics.snapshot()))
}
