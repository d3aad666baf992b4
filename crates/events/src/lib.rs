//! Realtime job-change fan-out.
//!
//! - [`EventBus`] is the in-process publish/subscribe hub for
//!   [`JobEvent`](genflow_db::models::event::JobEvent)s.
//! - [`JobChangeListener`] bridges PostgreSQL `NOTIFY job_changes` onto the
//!   bus.
//! - [`JobView`] is the subscriber-side reconciling store: one entry per job
//!   id, newer `updatedAt` wins.

pub mod bus;
pub mod listener;
pub mod reconcile;

pub use bus::{EventBus, OwnerSubscription};
pub use listener::JobChangeListener;
pub use reconcile::JobView;
