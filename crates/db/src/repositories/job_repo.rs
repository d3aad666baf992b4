//! Repository for the `jobs` table.
//!
//! Claim, complete and fail go through the stored procedures defined in
//! `migrations/20260101000003_job_functions.sql`; everything else is plain
//! SQL. Every mutation is guarded by a status predicate so a terminal row is
//! never touched.

use genflow_core::job::JobStatus;
use genflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{Job, JobListQuery, JobPage, JobStats, NewJob};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, job_type, payload, status_id, progress, priority, \
    retry_count, max_retries, retry_of_job_id, worker_id, \
    estimated_duration_secs, actual_duration_secs, result, error, \
    created_at, updated_at, available_at, started_at, completed_at";

/// Provides CRUD and lifecycle operations for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job and return the stored row.
    pub async fn insert(pool: &PgPool, input: &NewJob) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs \
                 (owner_id, job_type, payload, status_id, priority, \
                  retry_count, max_retries, retry_of_job_id, estimated_duration_secs, \
                  available_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, NOW())) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(input.owner_id)
            .bind(input.job_type.as_str())
            .bind(&input.payload)
            .bind(JobStatus::Pending.id())
            .bind(input.priority)
            .bind(input.retry_count)
            .bind(input.max_retries)
            .bind(input.retry_of_job_id)
            .bind(input.estimated_duration_secs)
            .bind(input.available_at)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next pending job for `worker_id`.
    pub async fn claim_next(pool: &PgPool, worker_id: &str) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM get_next_job($1)");
        sqlx::query_as::<_, Job>(&query)
            .bind(worker_id)
            .fetch_optional(pool)
            .await
    }

    /// Raise progress of a processing job. Never lowers it.
    pub async fn update_progress(
        pool: &PgPool,
        job_id: DbId,
        progress: i16,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET progress = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 AND progress < $2",
        )
        .bind(job_id)
        .bind(progress.clamp(0, 100))
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a processing job completed. Returns `false` if it was not processing.
    pub async fn complete(
        pool: &PgPool,
        job_id: DbId,
        result: &serde_json::Value,
        duration_secs: i32,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT complete_job($1, $2, $3)")
            .bind(job_id)
            .bind(result)
            .bind(duration_secs)
            .fetch_one(pool)
            .await
    }

    /// Mark a processing job failed. Returns `false` if it was not processing.
    pub async fn fail(pool: &PgPool, job_id: DbId, message: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT fail_job($1, $2)")
            .bind(job_id)
            .bind(message)
            .fetch_one(pool)
            .await
    }

    /// Cancel one of `owner_id`'s jobs if it is pending or processing.
    ///
    /// Returns `true` if the job was cancelled, `false` otherwise.
    pub async fn cancel(pool: &PgPool, job_id: DbId, owner_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND owner_id = $2 AND status_id IN ($4, $5)",
        )
        .bind(job_id)
        .bind(owner_id)
        .bind(JobStatus::Cancelled.id())
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a job by ID, optionally restricted to one owner.
    pub async fn find(
        pool: &PgPool,
        id: DbId,
        owner_id: Option<DbId>,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE id = $1 AND ($2::BIGINT IS NULL OR owner_id = $2)"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List one owner's jobs, newest first, with optional filters.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        params: &JobListQuery,
    ) -> Result<JobPage, sqlx::Error> {
        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions = vec!["owner_id = $1".to_string()];
        let mut bind_idx: u32 = 2;

        if params.status.is_some() {
            conditions.push(format!("status_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.job_type.is_some() {
            conditions.push(format!("job_type = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM jobs WHERE {where_clause}");
        let mut count = sqlx::query_scalar::<_, i64>(&count_query).bind(owner_id);

        let list_query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );
        let mut list = sqlx::query_as::<_, Job>(&list_query).bind(owner_id);

        if let Some(status) = params.status {
            count = count.bind(status.id());
            list = list.bind(status.id());
        }
        if let Some(job_type) = params.job_type {
            count = count.bind(job_type.as_str());
            list = list.bind(job_type.as_str());
        }

        let total = count.fetch_one(pool).await?;
        let jobs = list
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await?;

        Ok(JobPage::new(jobs, total, params))
    }

    /// Count one owner's jobs per status.
    pub async fn stats(pool: &PgPool, owner_id: DbId) -> Result<JobStats, sqlx::Error> {
        sqlx::query_as::<_, JobStats>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status_id = $2) AS pending, \
                    COUNT(*) FILTER (WHERE status_id = $3) AS processing, \
                    COUNT(*) FILTER (WHERE status_id = $4) AS completed, \
                    COUNT(*) FILTER (WHERE status_id = $5) AS failed, \
                    COUNT(*) FILTER (WHERE status_id = $6) AS cancelled \
             FROM jobs WHERE owner_id = $1",
        )
        .bind(owner_id)
        .bind(JobStatus::Pending.id())
        .bind(JobStatus::Processing.id())
        .bind(JobStatus::Completed.id())
        .bind(JobStatus::Failed.id())
        .bind(JobStatus::Cancelled.id())
        .fetch_one(pool)
        .await
    }
}
