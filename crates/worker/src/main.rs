use std::time::Duration;

use genflow_pipeline::PipelineConfig;
use genflow_worker::{logging, Runtime, WorkerConfig};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    logging::init_tracing("genflow_worker=debug,genflow_pipeline=debug");

    // --- Configuration ---
    let worker_config = WorkerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    tracing::info!(
        concurrency = worker_config.concurrency,
        store = ?worker_config.store_backend,
        provider = ?pipeline_config.provider_mode,
        "Loaded worker configuration",
    );

    // --- Services ---
    let runtime = Runtime::build(&worker_config, &pipeline_config)
        .await
        .expect("Failed to start worker runtime");

    // --- Processors ---
    let cancel = CancellationToken::new();
    let handles = runtime.spawn_processors(&worker_config, &cancel);
    tracing::info!(count = handles.len(), "Job processors started");

    shutdown_signal().await;
    tracing::info!("Shutdown requested, waiting for in-flight jobs");

    cancel.cancel();
    for handle in handles {
        // Bounded: a provider call may still be in flight.
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }

    tracing::info!("Worker shutdown complete");
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
