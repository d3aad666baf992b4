//! GenFlow HTTP API.
//!
//! Exposes the router, state, error mapping and WebSocket infrastructure so
//! integration tests and the binary entrypoint build the same application.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod realtime;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
