use std::sync::Arc;

use genflow_db::JobStore;
use genflow_events::EventBus;
use genflow_pipeline::{JobManager, PipelineMetrics};
use genflow_worker::Runtime;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every service is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub jobs: Arc<JobManager>,
    pub metrics: Arc<PipelineMetrics>,
    pub config: Arc<ServerConfig>,
    pub ws_manager: Arc<WsManager>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Build handler state around an assembled worker runtime.
    pub fn new(
        runtime: &Runtime,
        config: ServerConfig,
        ws_manager: Arc<WsManager>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store: Arc::clone(&runtime.store),
            jobs: Arc::new(runtime.job_manager()),
            metrics: Arc::clone(&runtime.metrics),
            config: Arc::new(config),
            ws_manager,
            event_bus,
        }
    }
}
