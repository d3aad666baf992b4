//! Single-process [`JobStore`] kept behind one async mutex.
//!
//! Every mutation happens under the lock, which gives the same exclusive
//! claim and state-machine guarantees as the PostgreSQL procedures. Row
//! changes are published on a broadcast channel in place of `NOTIFY`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use genflow_core::job::{JobStatus, PROGRESS_DONE};
use genflow_core::quota::{QuotaLimits, QuotaStatus};
use genflow_core::types::DbId;
use tokio::sync::{broadcast, Mutex};

use crate::error::StoreError;
use crate::models::event::{ChangeKind, JobEvent};
use crate::models::job::{Job, JobListQuery, JobPage, JobStats, NewJob};
use crate::store::JobStore;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct QuotaUsage {
    day: NaiveDate,
    daily_used: i32,
    month: (i32, u32),
    monthly_used: i32,
}

impl QuotaUsage {
    fn fresh(today: NaiveDate) -> Self {
        Self {
            day: today,
            daily_used: 0,
            month: (today.year(), today.month()),
            monthly_used: 0,
        }
    }

    /// Reset counters whose period has passed.
    fn roll_over(&mut self, today: NaiveDate) {
        if self.day != today {
            self.day = today;
            self.daily_used = 0;
        }
        let month = (today.year(), today.month());
        if self.month != month {
            self.month = month;
            self.monthly_used = 0;
        }
    }
}

#[derive(Default)]
struct State {
    next_id: DbId,
    jobs: BTreeMap<DbId, Job>,
    quotas: HashMap<DbId, QuotaUsage>,
}

/// In-memory job store.
pub struct MemoryJobStore {
    state: Mutex<State>,
    limits: QuotaLimits,
    events: broadcast::Sender<JobEvent>,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_quota_limits(QuotaLimits::default())
    }

    pub fn with_quota_limits(limits: QuotaLimits) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
            limits,
            events,
        }
    }

    /// Receive every row change made through this store.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn publish(&self, kind: ChangeKind, job: &Job) {
        // No receivers is fine.
        let _ = self.events.send(JobEvent::new(kind, job.clone()));
    }

    /// Apply `edit` to a job whose status is in `from`, publishing an UPDATE.
    async fn transition<F>(&self, id: DbId, from: &[JobStatus], edit: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return false;
        };
        if !from.contains(&job.status) {
            return false;
        }
        edit(job);
        job.updated_at = Utc::now();
        let snapshot = job.clone();
        drop(state);
        self.publish(ChangeKind::Update, &snapshot);
        true
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, input: NewJob) -> Result<Job, StoreError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let id = state.next_id;
        state.next_id += 1;
        let job = Job {
            id,
            owner_id: input.owner_id,
            job_type: input.job_type,
            payload: input.payload,
            status: JobStatus::Pending,
            progress: 0,
            priority: input.priority,
            retry_count: input.retry_count,
            max_retries: input.max_retries,
            retry_of_job_id: input.retry_of_job_id,
            worker_id: None,
            estimated_duration_secs: input.estimated_duration_secs,
            actual_duration_secs: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            available_at: input.available_at.unwrap_or(now),
            started_at: None,
            completed_at: None,
        };
        state.jobs.insert(id, job.clone());
        drop(state);
        self.publish(ChangeKind::Insert, &job);
        Ok(job)
    }

    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Job>, StoreError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        // Highest priority first, then oldest (ids grow with creation time).
        let next = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending && job.available_at <= now)
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.id.cmp(&a.id)))
            .map(|job| job.id);
        let Some(id) = next else {
            return Ok(None);
        };
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        job.status = JobStatus::Processing;
        job.worker_id = Some(worker_id.to_string());
        job.started_at = Some(now);
        job.updated_at = now;
        let claimed = job.clone();
        drop(state);
        self.publish(ChangeKind::Update, &claimed);
        Ok(Some(claimed))
    }

    async fn update_progress(&self, id: DbId, progress: i16) -> Result<bool, StoreError> {
        let progress = progress.clamp(0, PROGRESS_DONE);
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if job.status != JobStatus::Processing || job.progress >= progress {
            return Ok(false);
        }
        job.progress = progress;
        job.updated_at = Utc::now();
        let snapshot = job.clone();
        drop(state);
        self.publish(ChangeKind::Update, &snapshot);
        Ok(true)
    }

    async fn complete(
        &self,
        id: DbId,
        result: serde_json::Value,
        duration_secs: i32,
    ) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, &[JobStatus::Processing], |job| {
                job.status = JobStatus::Completed;
                job.progress = PROGRESS_DONE;
                job.result = Some(result);
                job.error = None;
                job.actual_duration_secs = Some(duration_secs);
                job.completed_at = Some(Utc::now());
            })
            .await)
    }

    async fn fail(&self, id: DbId, message: &str) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, &[JobStatus::Processing], |job| {
                let now = Utc::now();
                job.status = JobStatus::Failed;
                job.error = Some(message.to_string());
                job.result = None;
                job.actual_duration_secs = job
                    .started_at
                    .map(|started| (now - started).num_seconds() as i32);
                job.completed_at = Some(now);
            })
            .await)
    }

    async fn cancel(&self, id: DbId, owner_id: DbId) -> Result<bool, StoreError> {
        {
            let state = self.state.lock().await;
            match state.jobs.get(&id) {
                Some(job) if job.owner_id == owner_id => {}
                _ => return Ok(false),
            }
        }
        Ok(self
            .transition(id, &[JobStatus::Pending, JobStatus::Processing], |job| {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
            })
            .await)
    }

    async fn get(&self, id: DbId, owner_id: Option<DbId>) -> Result<Option<Job>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .get(&id)
            .filter(|job| owner_id.map_or(true, |owner| job.owner_id == owner))
            .cloned())
    }

    async fn list(&self, owner_id: DbId, query: &JobListQuery) -> Result<JobPage, StoreError> {
        let state = self.state.lock().await;
        let matching: Vec<&Job> = state
            .jobs
            .values()
            .rev()
            .filter(|job| job.owner_id == owner_id)
            .filter(|job| query.status.map_or(true, |s| job.status == s))
            .filter(|job| query.job_type.map_or(true, |t| job.job_type == t))
            .collect();
        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect();
        Ok(JobPage::new(data, total, query))
    }

    async fn stats(&self, owner_id: DbId) -> Result<JobStats, StoreError> {
        let state = self.state.lock().await;
        let mut stats = JobStats::default();
        for job in state.jobs.values().filter(|job| job.owner_id == owner_id) {
            stats.count(job.status);
        }
        Ok(stats)
    }

    async fn check_quota(&self, owner_id: DbId) -> Result<QuotaStatus, StoreError> {
        let today = Utc::now().date_naive();
        let mut state = self.state.lock().await;
        let usage = state
            .quotas
            .entry(owner_id)
            .or_insert_with(|| QuotaUsage::fresh(today));
        usage.roll_over(today);
        Ok(QuotaStatus::from_usage(
            self.limits,
            usage.daily_used,
            usage.monthly_used,
        ))
    }

    async fn increment_quota(&self, owner_id: DbId) -> Result<(), StoreError> {
        let today = Utc::now().date_naive();
        let mut state = self.state.lock().await;
        let usage = state
            .quotas
            .entry(owner_id)
            .or_insert_with(|| QuotaUsage::fresh(today));
        usage.roll_over(today);
        usage.daily_used += 1;
        usage.monthly_used += 1;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
