//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// GET    /stats           -> job_stats
/// GET    /{id}            -> get_job
/// DELETE /{id}            -> cancel_job
/// POST   /{id}/retry      -> retry_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/stats", get(jobs::job_stats))
        .route("/{id}", get(jobs::get_job).delete(jobs::cancel_job))
        .route("/{id}/retry", post(jobs::retry_job))
}
