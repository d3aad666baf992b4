//! WebSocket push of job events.
//!
//! Clients connect to `/api/ws?token=<jwt>` and receive their own
//! `{ eventType, job }` messages as JSON text frames.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
