//! `POST /api/generate`: queue a generation job for the caller.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genflow_core::error::CoreError;
use genflow_core::job::JobType;
use genflow_core::types::DbId;
use genflow_pipeline::CreateJob;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Body of `POST /api/generate`.
///
/// `useCase` names the job type, `choices` is the type-specific payload.
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    #[serde(rename = "useCase")]
    #[validate(length(min = 1, message = "useCase must not be empty"))]
    pub use_case: String,
    pub choices: serde_json::Value,
    pub priority: Option<i32>,
    /// Seconds.
    #[validate(range(min = 0, message = "estimated_duration must not be negative"))]
    pub estimated_duration: Option<i32>,
    #[validate(range(min = 0, max = 10, message = "max_retries must be between 0 and 10"))]
    pub max_retries: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub job_id: DbId,
}

impl GenerateRequest {
    fn into_create_job(self) -> Result<CreateJob, CoreError> {
        let job_type: JobType = self.use_case.parse()?;
        Ok(CreateJob {
            job_type,
            payload: self.choices,
            priority: self.priority,
            estimated_duration_secs: self.estimated_duration,
            max_retries: self.max_retries,
        })
    }
}

/// POST /api/generate
///
/// Validates, admits against the caller's quota and inserts a pending job.
/// Returns 201 with the new job id; nothing is persisted on rejection.
pub async fn create_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let job = state
        .jobs
        .create_job(auth.owner_id, input.into_create_job()?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(GenerateResponse { job_id: job.id })),
    ))
}
