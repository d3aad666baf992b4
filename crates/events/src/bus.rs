//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between whatever produces job
//! changes (the PostgreSQL listener, or the in-memory store) and the
//! WebSocket layer that pushes them to owners.

use genflow_core::types::DbId;
use genflow_db::models::event::JobEvent;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out of [`JobEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        // Zero receivers is not an error.
        let _ = self.sender.send(event);
    }

    /// Subscribe to every event on the bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of a single owner.
    pub fn subscribe_owner(&self, owner_id: DbId) -> OwnerSubscription {
        OwnerSubscription {
            owner_id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Republish everything arriving on `receiver` until it closes.
    ///
    /// Used to bridge a store-level channel (see
    /// `MemoryJobStore::subscribe`) onto the bus.
    pub async fn forward_from(&self, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.publish(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event forwarder lagged, some job events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Job event source closed, forwarder shutting down");
                    break;
                }
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// OwnerSubscription
// ---------------------------------------------------------------------------

/// A bus receiver that only yields one owner's events.
pub struct OwnerSubscription {
    owner_id: DbId,
    receiver: broadcast::Receiver<JobEvent>,
}

impl OwnerSubscription {
    pub fn owner_id(&self) -> DbId {
        self.owner_id
    }

    /// Wait for the next event belonging to this owner.
    ///
    /// Returns `None` once the bus is dropped. Lagged gaps are skipped; the
    /// subscriber is expected to reconcile with a fresh snapshot.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.owner_id() == self.owner_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(owner_id = self.owner_id, skipped = n, "Owner subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use genflow_core::job::{JobStatus, JobType};
    use genflow_db::models::event::ChangeKind;
    use genflow_db::models::job::Job;

    use super::*;

    pub(crate) fn job(id: DbId, owner_id: DbId) -> Job {
        let now = Utc::now();
        Job {
            id,
            owner_id,
            job_type: JobType::TextGeneration,
            payload: serde_json::json!({"prompt": "hi"}),
            status: JobStatus::Pending,
            progress: 0,
            priority: 0,
            retry_count: 0,
            max_retries: 3,
            retry_of_job_id: None,
            worker_id: None,
            estimated_duration_secs: None,
            actual_duration_secs: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            available_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::new(ChangeKind::Insert, job(1, 1)));

        assert_eq!(rx1.recv().await.unwrap().job.id, 1);
        assert_eq!(rx2.recv().await.unwrap().job.id, 1);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(JobEvent::new(ChangeKind::Update, job(1, 1)));
    }

    #[tokio::test]
    async fn owner_subscription_skips_other_owners() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_owner(2);

        bus.publish(JobEvent::new(ChangeKind::Insert, job(1, 1)));
        bus.publish(JobEvent::new(ChangeKind::Insert, job(2, 2)));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.job.id, 2);
        assert_eq!(sub.owner_id(), 2);
    }

    #[tokio::test]
    async fn owner_subscription_ends_when_bus_dropped() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_owner(1);
        drop(bus);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn forward_from_republishes_until_source_closes() {
        let bus = std::sync::Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let (tx, source) = broadcast::channel(8);

        let forwarder = tokio::spawn({
            let bus = std::sync::Arc::clone(&bus);
            async move { bus.forward_from(source).await }
        });

        tx.send(JobEvent::new(ChangeKind::Insert, job(5, 1))).unwrap();
        assert_eq!(rx.recv().await.unwrap().job.id, 5);

        drop(tx);
        forwarder.await.unwrap();
    }
}
