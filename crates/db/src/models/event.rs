//! Row-change events published for the realtime push channel.

use genflow_core::types::DbId;
use serde::{Deserialize, Serialize};

use super::job::Job;

/// Kind of change applied to a `jobs` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// `{ eventType, job }` as delivered to subscribers of one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub event_type: ChangeKind,
    pub job: Job,
}

impl JobEvent {
    pub fn new(event_type: ChangeKind, job: Job) -> Self {
        Self { event_type, job }
    }

    pub fn owner_id(&self) -> DbId {
        self.job.owner_id
    }
}
