//! The persistence contract consumed by the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use genflow_core::quota::QuotaStatus;
use genflow_core::types::DbId;

use crate::error::StoreError;
use crate::models::job::{Job, JobListQuery, JobPage, JobStats, NewJob};
use crate::repositories::{JobRepo, QuotaRepo};
use crate::DbPool;

/// Exclusive write API over job rows and quota counters.
///
/// Implementations must make [`claim_next_pending`](Self::claim_next_pending)
/// atomic across concurrent callers: a pending job is handed to exactly one
/// caller and flipped to `processing` as part of the claim. Mutations of a
/// job in a terminal state are no-ops reported as `false`, never errors.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: NewJob) -> Result<Job, StoreError>;

    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Job>, StoreError>;

    /// Raise a processing job's progress; lower values are ignored.
    async fn update_progress(&self, id: DbId, progress: i16) -> Result<bool, StoreError>;

    async fn complete(
        &self,
        id: DbId,
        result: serde_json::Value,
        duration_secs: i32,
    ) -> Result<bool, StoreError>;

    async fn fail(&self, id: DbId, message: &str) -> Result<bool, StoreError>;

    /// Cancel a pending or processing job owned by `owner_id`.
    async fn cancel(&self, id: DbId, owner_id: DbId) -> Result<bool, StoreError>;

    async fn get(&self, id: DbId, owner_id: Option<DbId>) -> Result<Option<Job>, StoreError>;

    async fn list(&self, owner_id: DbId, query: &JobListQuery) -> Result<JobPage, StoreError>;

    async fn stats(&self, owner_id: DbId) -> Result<JobStats, StoreError>;

    async fn check_quota(&self, owner_id: DbId) -> Result<QuotaStatus, StoreError>;

    async fn increment_quota(&self, owner_id: DbId) -> Result<(), StoreError>;

    /// Insert a fresh pending attempt of `original`, claimable after `delay`.
    async fn requeue(&self, original: &Job, delay: Duration) -> Result<Job, StoreError> {
        self.insert(NewJob::retry_of(original).delayed_by(delay)).await
    }

    async fn health_check(&self) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// [`JobStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: NewJob) -> Result<Job, StoreError> {
        Ok(JobRepo::insert(&self.pool, &job).await?)
    }

    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::claim_next(&self.pool, worker_id).await?)
    }

    async fn update_progress(&self, id: DbId, progress: i16) -> Result<bool, StoreError> {
        Ok(JobRepo::update_progress(&self.pool, id, progress).await?)
    }

    async fn complete(
        &self,
        id: DbId,
        result: serde_json::Value,
        duration_secs: i32,
    ) -> Result<bool, StoreError> {
        Ok(JobRepo::complete(&self.pool, id, &result, duration_secs).await?)
    }

    async fn fail(&self, id: DbId, message: &str) -> Result<bool, StoreError> {
        Ok(JobRepo::fail(&self.pool, id, message).await?)
    }

    async fn cancel(&self, id: DbId, owner_id: DbId) -> Result<bool, StoreError> {
        Ok(JobRepo::cancel(&self.pool, id, owner_id).await?)
    }

    async fn get(&self, id: DbId, owner_id: Option<DbId>) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::find(&self.pool, id, owner_id).await?)
    }

    async fn list(&self, owner_id: DbId, query: &JobListQuery) -> Result<JobPage, StoreError> {
        Ok(JobRepo::list_by_owner(&self.pool, owner_id, query).await?)
    }

    async fn stats(&self, owner_id: DbId) -> Result<JobStats, StoreError> {
        Ok(JobRepo::stats(&self.pool, owner_id).await?)
    }

    async fn check_quota(&self, owner_id: DbId) -> Result<QuotaStatus, StoreError> {
        Ok(QuotaRepo::check(&self.pool, owner_id).await?)
    }

    async fn increment_quota(&self, owner_id: DbId) -> Result<(), StoreError> {
        Ok(QuotaRepo::increment(&self.pool, owner_id).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
