//! User-facing job façade: admission-checked creation plus owner-scoped
//! reads, cancellation, stats and manual retry.

use std::sync::Arc;
use std::time::Duration;

use genflow_core::error::CoreError;
use genflow_core::job::{JobStatus, JobType, DEFAULT_MAX_RETRIES, MAX_RETRIES_LIMIT};
use genflow_core::payload::validate_payload;
use genflow_core::types::DbId;
use genflow_db::models::job::{Job, JobListQuery, JobPage, JobStats, NewJob};
use genflow_db::JobStore;

use crate::quota::QuotaGuard;

/// Input for [`JobManager::create_job`].
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub priority: Option<i32>,
    pub estimated_duration_secs: Option<i32>,
    pub max_retries: Option<i32>,
}

impl CreateJob {
    pub fn new(job_type: JobType, payload: serde_json::Value) -> Self {
        Self {
            job_type,
            payload,
            priority: None,
            estimated_duration_secs: None,
            max_retries: None,
        }
    }
}

pub struct JobManager {
    store: Arc<dyn JobStore>,
    quota: QuotaGuard,
}

impl JobManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let quota = QuotaGuard::new(Arc::clone(&store));
        Self { store, quota }
    }

    /// Validate, admit and insert a new pending job.
    ///
    /// Validation and quota rejections never touch the jobs table. A failed
    /// quota increment is logged and the job is kept.
    pub async fn create_job(&self, owner_id: DbId, input: CreateJob) -> Result<Job, CoreError> {
        let payload = validate_payload(input.job_type, &input.payload)?;

        let max_retries = input.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if !(0..=MAX_RETRIES_LIMIT).contains(&max_retries) {
            return Err(CoreError::Validation(format!(
                "'max_retries' must be between 0 and {MAX_RETRIES_LIMIT}"
            )));
        }
        if input.estimated_duration_secs.is_some_and(|secs| secs < 0) {
            return Err(CoreError::Validation(
                "'estimated_duration' must not be negative".to_string(),
            ));
        }

        self.quota.admit(owner_id).await?.into_result()?;

        let mut new_job = NewJob::new(owner_id, input.job_type, payload);
        new_job.priority = input.priority.unwrap_or(0);
        new_job.max_retries = max_retries;
        new_job.estimated_duration_secs = input.estimated_duration_secs;

        let job = self.store.insert(new_job).await?;
        self.quota.record_usage(owner_id).await;

        tracing::info!(
            job_id = job.id,
            owner_id,
            job_type = %job.job_type,
            priority = job.priority,
            "Job created",
        );
        Ok(job)
    }

    pub async fn get_job(&self, owner_id: DbId, job_id: DbId) -> Result<Job, CoreError> {
        self.store
            .get(job_id, Some(owner_id))
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Job",
                id: job_id,
            })
    }

    pub async fn list_jobs(&self, owner_id: DbId, query: &JobListQuery) -> Result<JobPage, CoreError> {
        Ok(self.store.list(owner_id, query).await?)
    }

    /// Cancel a pending or processing job.
    ///
    /// Returns `false` when the job exists but is already terminal.
    pub async fn cancel_job(&self, owner_id: DbId, job_id: DbId) -> Result<bool, CoreError> {
        if self.store.cancel(job_id, owner_id).await? {
            tracing::info!(job_id, owner_id, "Job cancelled");
            return Ok(true);
        }
        // Distinguish "not yours / missing" from "already terminal".
        self.get_job(owner_id, job_id).await?;
        Ok(false)
    }

    pub async fn stats(&self, owner_id: DbId) -> Result<JobStats, CoreError> {
        Ok(self.store.stats(owner_id).await?)
    }

    /// Re-submit a failed job as a new pending attempt.
    ///
    /// Goes through admission like a fresh submission.
    pub async fn retry_job(&self, owner_id: DbId, job_id: DbId) -> Result<Job, CoreError> {
        let original = self.get_job(owner_id, job_id).await?;
        if original.status != JobStatus::Failed {
            return Err(CoreError::Conflict(format!(
                "Only failed jobs can be retried (job is {})",
                original.status
            )));
        }

        self.quota.admit(owner_id).await?.into_result()?;
        let job = self.store.requeue(&original, Duration::ZERO).await?;
        self.quota.record_usage(owner_id).await;

        tracing::info!(job_id = job.id, retry_of = original.id, owner_id, "Job re-submitted");
        Ok(job)
    }
}
