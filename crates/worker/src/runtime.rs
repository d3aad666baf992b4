//! Start-up wiring: one store, one provider client, one cache, one rate
//! limiter and one metrics sink, shared by every processor and handler.

use std::sync::Arc;

use anyhow::Context;
use genflow_db::{DbPool, JobStore, MemoryJobStore, PgJobStore};
use genflow_pipeline::{
    HandlerRegistry, JobManager, Orchestrator, PipelineConfig, PipelineMetrics, ProviderMode,
    RateLimiter, ResponseCache,
};
use genflow_provider::{
    GenerationClient, HttpGenerationClient, PromptBuilder, StubGenerationClient,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{StoreBackend, WorkerConfig};
use crate::processor::JobProcessor;

/// Concrete store handle, kept so callers can reach backend-specific
/// features (the pool for `LISTEN`, the in-memory event channel).
#[derive(Clone)]
pub enum StoreHandle {
    Postgres(DbPool),
    Memory(Arc<MemoryJobStore>),
}

/// Shared services for processors and the job manager.
#[derive(Clone)]
pub struct Runtime {
    pub store: Arc<dyn JobStore>,
    pub handle: StoreHandle,
    pub registry: Arc<HandlerRegistry>,
    pub metrics: Arc<PipelineMetrics>,
    pub cache: Arc<ResponseCache>,
}

impl Runtime {
    /// Connect the configured store and provider.
    pub async fn build(worker: &WorkerConfig, pipeline: &PipelineConfig) -> anyhow::Result<Self> {
        let handle = match worker.store_backend {
            StoreBackend::Postgres => {
                let url = worker
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set for the postgres store")?;
                let pool = genflow_db::create_pool(url)
                    .await
                    .context("Failed to connect to database")?;
                genflow_db::health_check(&pool)
                    .await
                    .context("Database health check failed")?;
                genflow_db::run_migrations(&pool)
                    .await
                    .context("Failed to run database migrations")?;
                tracing::info!("Database ready");
                StoreHandle::Postgres(pool)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory job store, jobs are lost on restart");
                StoreHandle::Memory(Arc::new(MemoryJobStore::new()))
            }
        };

        let client: Arc<dyn GenerationClient> = match pipeline.provider_mode {
            ProviderMode::Http => {
                let url = pipeline
                    .provider_url
                    .clone()
                    .context("PROVIDER_URL must be set for the http provider")?;
                tracing::info!(provider_url = %url, "Using HTTP generation provider");
                Arc::new(HttpGenerationClient::new(
                    url,
                    pipeline.provider_api_key.clone(),
                    pipeline.provider_timeout,
                )?)
            }
            ProviderMode::Stub => {
                tracing::warn!("Using stub generation provider");
                Arc::new(StubGenerationClient::new())
            }
        };

        Ok(Self::assemble(handle, client, pipeline))
    }

    /// Wire services around an existing store and client.
    pub fn assemble(
        handle: StoreHandle,
        client: Arc<dyn GenerationClient>,
        pipeline: &PipelineConfig,
    ) -> Self {
        let store: Arc<dyn JobStore> = match &handle {
            StoreHandle::Postgres(pool) => Arc::new(PgJobStore::new(pool.clone())),
            StoreHandle::Memory(store) => Arc::clone(store) as Arc<dyn JobStore>,
        };

        let cache = Arc::new(ResponseCache::new(pipeline.cache_max_entries));
        let rate_limiter = Arc::new(RateLimiter::in_memory(
            pipeline.rate_limit_max_requests,
            pipeline.rate_limit_window,
            pipeline.rate_limit_failure_policy,
        ));
        let metrics = Arc::new(PipelineMetrics::new());

        let orchestrator = Orchestrator::new(
            client,
            Arc::clone(&cache),
            rate_limiter,
            Arc::clone(&metrics),
        )
        .with_provider_timeout(pipeline.provider_timeout)
        .with_prompt_builder(prompt_builder(pipeline));
        let registry = Arc::new(HandlerRegistry::with_orchestrator(Arc::new(orchestrator)));

        Self {
            store,
            handle,
            registry,
            metrics,
            cache,
        }
    }

    pub fn job_manager(&self) -> JobManager {
        JobManager::new(Arc::clone(&self.store))
    }

    pub fn processor(&self, worker_id: impl Into<String>, worker: &WorkerConfig) -> JobProcessor {
        JobProcessor::new(worker_id, Arc::clone(&self.store), Arc::clone(&self.registry))
            .with_polling(worker.poll_interval, worker.max_idle_backoff)
    }

    /// Spawn `worker.concurrency` processor loops.
    pub fn spawn_processors(
        &self,
        worker: &WorkerConfig,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let prefix = uuid::Uuid::new_v4().simple().to_string();
        (0..worker.concurrency)
            .map(|i| {
                let processor = self.processor(format!("worker-{}-{i}", &prefix[..8]), worker);
                let cancel = cancel.clone();
                tokio::spawn(async move { processor.run(cancel).await })
            })
            .collect()
    }
}

fn prompt_builder(pipeline: &PipelineConfig) -> PromptBuilder {
    match &pipeline.provider_model_prefix {
        Some(prefix) => PromptBuilder::new().with_model_prefix(prefix.clone()),
        None => PromptBuilder::new(),
    }
}
