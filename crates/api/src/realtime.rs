//! Feeds job-row changes from the active store onto the [`EventBus`].

use std::sync::Arc;

use genflow_events::{EventBus, JobChangeListener};
use genflow_worker::runtime::StoreHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn the task that republishes store changes on `bus`.
///
/// PostgreSQL changes arrive through `LISTEN job_changes`; the in-memory
/// store exposes its own broadcast channel. The memory forwarder only ends
/// when the store is dropped, so callers abort the handle on shutdown.
pub fn spawn_event_bridge(
    handle: &StoreHandle,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    match handle {
        StoreHandle::Postgres(pool) => {
            let listener = JobChangeListener::new(pool.clone(), bus);
            tokio::spawn(async move {
                if let Err(e) = listener.run(cancel).await {
                    tracing::error!(error = %e, "Job change listener stopped");
                }
            })
        }
        StoreHandle::Memory(store) => {
            let receiver = store.subscribe();
            tokio::spawn(async move { bus.forward_from(receiver).await })
        }
    }
}
