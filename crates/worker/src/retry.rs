//! What happens to a job after a failed attempt.
//!
//! A failed attempt stays `failed`. If the error is transient and the job
//! has retries left, a fresh `pending` attempt is inserted with
//! `retry_count + 1` and `retry_of_job_id` pointing at the failed row.
//! Rate-limited attempts are held back until the limiting window frees up.

use std::time::Duration;

use genflow_core::error::CoreError;
use genflow_db::models::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Insert a new pending attempt, claimable after `delay`.
    Requeue { delay: Duration },
    /// The error is permanent (validation, moderation, internal).
    NotRetryable,
    /// `retry_count` has reached `max_retries`.
    Exhausted,
}

impl RetryDecision {
    pub fn for_failure(job: &Job, error: &CoreError) -> Self {
        if !error.is_retryable() {
            RetryDecision::NotRetryable
        } else if job.retry_count >= job.max_retries {
            RetryDecision::Exhausted
        } else {
            RetryDecision::Requeue {
                delay: error.retry_after().unwrap_or(Duration::ZERO),
            }
        }
    }
}
