//! Job entity models and DTOs.

use std::time::Duration;

use chrono::Utc;
use genflow_core::job::{JobStatus, JobType, DEFAULT_MAX_RETRIES};
use genflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 20;

/// A row from the `jobs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: DbId,
    pub owner_id: DbId,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub job_type: JobType,
    pub payload: serde_json::Value,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: JobStatus,
    pub progress: i16,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub retry_of_job_id: Option<DbId>,
    pub worker_id: Option<String>,
    pub estimated_duration_secs: Option<i32>,
    pub actual_duration_secs: Option<i32>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Earliest time a processor may claim the job.
    pub available_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

/// Insert payload for a new `pending` job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: DbId,
    pub job_type: JobType,
    /// Normalized payload (see `genflow_core::payload::validate_payload`).
    pub payload: serde_json::Value,
    pub priority: i32,
    pub max_retries: i32,
    pub retry_count: i32,
    pub retry_of_job_id: Option<DbId>,
    pub estimated_duration_secs: Option<i32>,
    /// Defer claiming until this time. `None` means immediately.
    pub available_at: Option<Timestamp>,
}

impl NewJob {
    pub fn new(owner_id: DbId, job_type: JobType, payload: serde_json::Value) -> Self {
        Self {
            owner_id,
            job_type,
            payload,
            priority: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_count: 0,
            retry_of_job_id: None,
            estimated_duration_secs: None,
            available_at: None,
        }
    }

    /// A fresh attempt of `original`, linked back to it.
    pub fn retry_of(original: &Job) -> Self {
        Self {
            owner_id: original.owner_id,
            job_type: original.job_type,
            payload: original.payload.clone(),
            priority: original.priority,
            max_retries: original.max_retries,
            retry_count: original.retry_count + 1,
            retry_of_job_id: Some(original.id),
            estimated_duration_secs: original.estimated_duration_secs,
            available_at: None,
        }
    }

    /// Keep the job unclaimable for `delay` from now.
    pub fn delayed_by(mut self, delay: Duration) -> Self {
        if !delay.is_zero() {
            self.available_at = chrono::Duration::from_std(delay)
                .ok()
                .and_then(|delay| Utc::now().checked_add_signed(delay));
        }
        self
    }
}

/// Query parameters for `GET /api/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobListQuery {
    /// 1-based page number. Values below 1 are treated as 1.
    pub page: Option<i64>,
    /// Page size. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    pub status: Option<JobStatus>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
}

impl JobListQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// One page of an owner's jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPage {
    pub data: Vec<Job>,
    pub total: i64,
    pub has_more: bool,
}

impl JobPage {
    pub fn new(data: Vec<Job>, total: i64, query: &JobListQuery) -> Self {
        let has_more = query.offset() + (data.len() as i64) < total;
        Self {
            data,
            total,
            has_more,
        }
    }
}

/// Per-status job counts for one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl JobStats {
    pub fn count(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delayed_retry_is_scheduled_in_the_future() {
        let before = Utc::now();
        let job = NewJob::new(1, JobType::TextGeneration, serde_json::json!({"prompt": "p"}))
            .delayed_by(Duration::from_secs(30));
        let at = job.available_at.unwrap();
        assert!(at >= before + chrono::Duration::seconds(30));

        let now = NewJob::new(1, JobType::TextGeneration, serde_json::json!({"prompt": "p"}))
            .delayed_by(Duration::ZERO);
        assert!(now.available_at.is_none());
    }

    #[test]
    fn list_query_clamps_page_and_limit() {
        let q = JobListQuery {
            page: Some(0),
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), MAX_LIMIT);
        assert_eq!(q.offset(), 0);
    }

    #[test]
    fn list_query_offset_follows_page() {
        let q = JobListQuery {
            page: Some(3),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(q.offset(), 20);
    }

    #[test]
    fn list_query_parses_type_alias() {
        let q: JobListQuery =
            serde_json::from_value(serde_json::json!({"type": "3d-modeling", "status": "failed"}))
                .unwrap();
        assert_eq!(q.job_type, Some(JobType::ThreeDModeling));
        assert_eq!(q.status, Some(JobStatus::Failed));
    }

    #[test]
    fn page_reports_more_when_rows_remain() {
        let q = JobListQuery {
            page: Some(1),
            limit: Some(2),
            ..Default::default()
        };
        let page = JobPage::new(Vec::new(), 5, &q);
        assert!(page.has_more);
        let last = JobListQuery {
            page: Some(3),
            limit: Some(2),
            ..Default::default()
        };
        assert!(!JobPage::new(Vec::new(), 4, &last).has_more);
    }
}
