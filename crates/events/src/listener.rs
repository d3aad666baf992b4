//! PostgreSQL `LISTEN job_changes` bridge.
//!
//! The `trg_jobs_notify` trigger sends `{op, id, owner_id}`; the listener
//! re-reads the row and publishes a full [`JobEvent`] on the bus.

use std::sync::Arc;

use genflow_core::types::DbId;
use genflow_db::models::event::{ChangeKind, JobEvent};
use genflow_db::repositories::JobRepo;
use genflow_db::DbPool;
use serde::Deserialize;
use sqlx::postgres::PgListener;
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;

/// Channel name used by the notify trigger.
pub const JOB_CHANGES_CHANNEL: &str = "job_changes";

/// Body of one `job_changes` notification.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChangeNotice {
    pub op: ChangeKind,
    pub id: DbId,
    pub owner_id: DbId,
}

impl ChangeNotice {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

/// Background service turning database notifications into bus events.
pub struct JobChangeListener {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl JobChangeListener {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Listen until `cancel` fires.
    ///
    /// `PgListener` reconnects on its own after a dropped connection;
    /// notifications sent while disconnected are lost and subscribers
    /// recover by refetching.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(JOB_CHANGES_CHANNEL).await?;
        tracing::info!(channel = JOB_CHANGES_CHANNEL, "Job change listener started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job change listener cancelled");
                    break;
                }
                notification = listener.recv() => {
                    match notification {
                        Ok(notification) => self.handle(notification.payload()).await,
                        Err(e) => {
                            tracing::error!(error = %e, "Job change listener receive failed");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle(&self, payload: &str) {
        let notice = match ChangeNotice::parse(payload) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!(error = %e, payload, "Malformed job change notification");
                return;
            }
        };

        match JobRepo::find(&self.pool, notice.id, Some(notice.owner_id)).await {
            Ok(Some(job)) => self.bus.publish(JobEvent::new(notice.op, job)),
            Ok(None) => {
                tracing::debug!(job_id = notice.id, "Changed job no longer exists");
            }
            Err(e) => {
                tracing::error!(job_id = notice.id, error = %e, "Failed to load changed job");
            }
        }
    }
}
