//! Handlers for the `/jobs` resource.
//!
//! All endpoints require authentication via [`AuthUser`] and only ever see
//! the caller's own jobs; another owner's job is reported as not found.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genflow_core::types::DbId;
use genflow_db::models::job::JobListQuery;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// `false` when the job had already reached a terminal state.
    pub cancelled: bool,
}

/// Unwrap the `{id}` segment, reporting a non-numeric id in the error envelope.
fn job_id(path: Result<Path<DbId>, PathRejection>) -> AppResult<DbId> {
    let Path(id) = path.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/jobs?page=&limit=&status=&type=
///
/// Newest first. `page` is clamped to at least 1 and `limit` to 1..=100.
pub async fn list_jobs(
    auth: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<JobListQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let page = state.jobs.list_jobs(auth.owner_id, &params).await?;
    Ok(Json(ApiResponse::ok(page)))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/jobs/{id}
pub async fn get_job(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<DbId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let job_id = job_id(path)?;
    let job = state.jobs.get_job(auth.owner_id, job_id).await?;
    Ok(Json(ApiResponse::ok(job)))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// DELETE /api/jobs/{id}
///
/// Cancels a pending or processing job. Cancelling a terminal job is a
/// no-op that still returns 200, with `cancelled: false`.
pub async fn cancel_job(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<DbId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let job_id = job_id(path)?;
    let cancelled = state.jobs.cancel_job(auth.owner_id, job_id).await?;
    Ok(Json(ApiResponse::ok(CancelResponse { cancelled })))
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// POST /api/jobs/{id}/retry
///
/// Re-submits a failed job as a new pending attempt (consumes quota).
/// Returns 201 with the new job, 409 if the job is not failed.
pub async fn retry_job(
    auth: AuthUser,
    State(state): State<AppState>,
    path: Result<Path<DbId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let job_id = job_id(path)?;
    let job = state.jobs.retry_job(auth.owner_id, job_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(job))))
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// GET /api/jobs/stats
pub async fn job_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let stats = state.jobs.stats(auth.owner_id).await?;
    Ok(Json(ApiResponse::ok(stats)))
}
