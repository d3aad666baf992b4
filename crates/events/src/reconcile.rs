//! Subscriber-side view of one owner's jobs.
//!
//! Realtime events and list snapshots can arrive in any order. [`JobView`]
//! keys entries by job id and keeps whichever copy has the newer
//! `updated_at`, so an INSERT racing a page refresh never produces a
//! duplicate and a stale UPDATE never overwrites a newer row.

use std::collections::HashMap;

use genflow_core::types::DbId;
use genflow_db::models::event::{ChangeKind, JobEvent};
use genflow_db::models::job::Job;

#[derive(Debug, Default, Clone)]
pub struct JobView {
    jobs: HashMap<DbId, Job>,
}

impl JobView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one realtime event. Returns `true` if the view changed.
    pub fn apply_event(&mut self, event: JobEvent) -> bool {
        match event.event_type {
            ChangeKind::Delete => self.jobs.remove(&event.job.id).is_some(),
            ChangeKind::Insert | ChangeKind::Update => self.merge(event.job),
        }
    }

    /// Merge a fetched page of jobs.
    pub fn apply_snapshot(&mut self, jobs: impl IntoIterator<Item = Job>) {
        for job in jobs {
            self.merge(job);
        }
    }

    fn merge(&mut self, job: Job) -> bool {
        match self.jobs.get(&job.id) {
            Some(existing) if existing.updated_at > job.updated_at => false,
            Some(existing) if *existing == job => false,
            _ => {
                self.jobs.insert(job.id, job);
                true
            }
        }
    }

    pub fn get(&self, id: DbId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs newest first.
    pub fn list(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.values().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs
    }
}
