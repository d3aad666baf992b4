//! Polling job processor.
//!
//! Each [`JobProcessor`] is an independent loop: claim one pending job,
//! drive it through the handler registry, then complete or fail it. Any
//! number of processors may run against the same store; exclusivity comes
//! from the store's atomic claim, not from coordination between loops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use genflow_core::error::CoreError;
use genflow_core::job::PROGRESS_CLAIMED;
use genflow_core::types::DbId;
use genflow_db::models::job::Job;
use genflow_db::JobStore;
use genflow_pipeline::{HandlerRegistry, ProgressReporter, StoreProgress};
use tokio_util::sync::CancellationToken;

use crate::retry::RetryDecision;

/// Default polling interval when the queue is empty.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default ceiling for the idle backoff.
pub const DEFAULT_MAX_IDLE_BACKOFF: Duration = Duration::from_secs(10);

/// Result of one processing cycle that claimed a job.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Completed { job_id: DbId },
    Failed {
        job_id: DbId,
        /// The new pending attempt, if one was queued.
        requeued_as: Option<DbId>,
    },
    /// The row left `processing` while we worked (e.g. cancelled); the
    /// outcome was dropped.
    Discarded { job_id: DbId },
}

pub struct JobProcessor {
    worker_id: String,
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    poll_interval: Duration,
    max_idle_backoff: Duration,
}

impl JobProcessor {
    pub fn new(
        worker_id: impl Into<String>,
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            store,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_idle_backoff: DEFAULT_MAX_IDLE_BACKOFF,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_idle_backoff: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_idle_backoff = max_idle_backoff.max(poll_interval);
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run the processor loop until the cancellation token is triggered.
    ///
    /// An empty queue doubles the wait up to `max_idle_backoff`; any claimed
    /// job resets it so a busy queue is drained without sleeping.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            worker_id = %self.worker_id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Job processor started",
        );

        let mut idle_wait = self.poll_interval;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let wait = match self.run_once().await {
                Ok(Some(_)) => {
                    idle_wait = self.poll_interval;
                    continue;
                }
                Ok(None) => {
                    let wait = idle_wait;
                    idle_wait = (idle_wait * 2).min(self.max_idle_backoff);
                    wait
                }
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "Processing cycle failed");
                    idle_wait
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Job processor shutting down");
    }

    /// One cycle: claim a job and drive it to a terminal state.
    ///
    /// Returns `Ok(None)` when nothing was pending.
    pub async fn run_once(&self) -> Result<Option<ProcessOutcome>, CoreError> {
        let Some(job) = self.store.claim_next_pending(&self.worker_id).await? else {
            return Ok(None);
        };

        tracing::info!(
            job_id = job.id,
            worker_id = %self.worker_id,
            job_type = %job.job_type,
            retry_count = job.retry_count,
            "Job claimed",
        );

        let progress = StoreProgress::new(Arc::clone(&self.store), job.id);
        progress.report(PROGRESS_CLAIMED).await;

        let started = Instant::now();
        let result = self.registry.dispatch(&job, &progress).await;
        let duration_secs = started.elapsed().as_secs().min(i32::MAX as u64) as i32;

        let outcome = match result {
            Ok(value) => self.finish_success(&job, value, duration_secs).await?,
            Err(e) => self.finish_failure(&job, &e).await?,
        };
        Ok(Some(outcome))
    }

    async fn finish_success(
        &self,
        job: &Job,
        result: serde_json::Value,
        duration_secs: i32,
    ) -> Result<ProcessOutcome, CoreError> {
        if !self.store.complete(job.id, result, duration_secs).await? {
            tracing::info!(job_id = job.id, "Job left processing before completion, result dropped");
            return Ok(ProcessOutcome::Discarded { job_id: job.id });
        }
        tracing::info!(job_id = job.id, duration_secs, "Job completed");
        Ok(ProcessOutcome::Completed { job_id: job.id })
    }

    async fn finish_failure(&self, job: &Job, error: &CoreError) -> Result<ProcessOutcome, CoreError> {
        if !self.store.fail(job.id, &error.user_message()).await? {
            tracing::info!(job_id = job.id, error = %error, "Job left processing before failure, error dropped");
            return Ok(ProcessOutcome::Discarded { job_id: job.id });
        }

        let decision = RetryDecision::for_failure(job, error);
        tracing::warn!(
            job_id = job.id,
            error = %error,
            kind = error.kind(),
            decision = ?decision,
            "Job failed",
        );

        let requeued_as = match decision {
            RetryDecision::Requeue { delay } => {
                let retry = self.store.requeue(job, delay).await?;
                tracing::info!(
                    job_id = retry.id,
                    retry_of = job.id,
                    retry_count = retry.retry_count,
                    delay_secs = delay.as_secs(),
                    "Job re-queued",
                );
                Some(retry.id)
            }
            RetryDecision::NotRetryable | RetryDecision::Exhausted => None,
        };

        Ok(ProcessOutcome::Failed {
            job_id: job.id,
            requeued_as,
        })
    }
}
