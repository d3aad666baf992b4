use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use genflow_api::config::ServerConfig;
use genflow_api::state::AppState;
use genflow_api::{realtime, router, ws};
use genflow_events::EventBus;
use genflow_pipeline::PipelineConfig;
use genflow_worker::runtime::StoreHandle;
use genflow_worker::{logging, Runtime, WorkerConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    logging::init_tracing("genflow_api=debug,genflow_pipeline=debug,tower_http=debug");

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let worker_config = WorkerConfig {
        concurrency: config.embedded_workers,
        ..WorkerConfig::from_env()
    };
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?worker_config.store_backend,
        embedded_workers = config.embedded_workers,
        "Loaded server configuration",
    );

    // --- Services ---
    let runtime = Runtime::build(&worker_config, &pipeline_config)
        .await
        .expect("Failed to start job runtime");

    let cancel = CancellationToken::new();

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let bridge_handle =
        realtime::spawn_event_bridge(&runtime.handle, Arc::clone(&event_bus), cancel.clone());
    tracing::info!("Job event bridge started");

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Embedded processors ---
    let processor_handles = runtime.spawn_processors(&worker_config, &cancel);
    if !processor_handles.is_empty() {
        tracing::info!(count = processor_handles.len(), "Embedded job processors started");
    } else if matches!(runtime.handle, StoreHandle::Memory(_)) {
        tracing::warn!("In-memory store without EMBEDDED_WORKERS, jobs will never be processed");
    }

    // --- App ---
    let state = AppState::new(
        &runtime,
        config.clone(),
        Arc::clone(&ws_manager),
        Arc::clone(&event_bus),
    );
    let app = router::build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    for handle in processor_handles {
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }
    tracing::info!("Embedded job processors stopped");

    bridge_handle.abort();

    ws_manager.shutdown_all().await;
    heartbeat_handle.abort();

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
