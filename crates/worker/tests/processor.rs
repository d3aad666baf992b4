//! End-to-end processing against the in-memory store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use genflow_core::job::{JobStatus, JobType};
use genflow_core::output::ProviderOutput;
use genflow_db::models::job::JobListQuery;
use genflow_db::{JobStore, MemoryJobStore};
use genflow_pipeline::{CreateJob, PipelineConfig};
use genflow_provider::{
    GenerationClient, Moderation, ProviderError, ProviderRequest, StubGenerationClient,
};
use genflow_worker::runtime::StoreHandle;
use genflow_worker::{ProcessOutcome, Runtime, StoreBackend, WorkerConfig};
use serde_json::json;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Provider that fails with a 503 until `failures` calls have been made.
struct FlakyClient {
    failures: u32,
    calls: AtomicU32,
}

#[async_trait]
impl GenerationClient for FlakyClient {
    async fn generate(&self, _: &ProviderRequest) -> Result<ProviderOutput, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(ProviderError::Api {
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(ProviderOutput::Structured(json!({"images": ["https://cdn/ok.png"]})))
    }

    async fn moderate(&self, _: &str) -> Result<Moderation, ProviderError> {
        Ok(Moderation::default())
    }
}

/// Provider that records the model name of every generation request.
#[derive(Default)]
struct RecordingClient {
    models: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl GenerationClient for RecordingClient {
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput, ProviderError> {
        self.models.lock().unwrap().push(request.model.clone());
        Ok(ProviderOutput::Structured(json!({"images": ["https://cdn/ok.png"]})))
    }

    async fn moderate(&self, _: &str) -> Result<Moderation, ProviderError> {
        Ok(Moderation::default())
    }
}

fn worker_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 2,
        poll_interval: Duration::from_millis(10),
        max_idle_backoff: Duration::from_millis(50),
        store_backend: StoreBackend::Memory,
        database_url: None,
    }
}

fn runtime(client: Arc<dyn GenerationClient>) -> (Runtime, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new());
    let runtime = Runtime::assemble(
        StoreHandle::Memory(Arc::clone(&store)),
        client,
        &PipelineConfig::default(),
    );
    (runtime, store)
}

fn image(prompt: &str) -> CreateJob {
    CreateJob::new(JobType::ImageGeneration, json!({ "prompt": prompt }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_image_job_completes_end_to_end() {
    let (runtime, store) = runtime(Arc::new(StubGenerationClient::new()));
    let manager = runtime.job_manager();

    let job = manager.create_job(1, image("a red cube")).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0);

    let outcome = runtime
        .processor("w-1", &worker_config())
        .run_once()
        .await
        .unwrap();
    assert_eq!(outcome, Some(ProcessOutcome::Completed { job_id: job.id }));

    let done = store.get(job.id, Some(1)).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.result.is_some());
    assert!(done.error.is_none());
    assert!(done.completed_at.is_some());
    assert_eq!(done.worker_id.as_deref(), Some("w-1"));
}

#[tokio::test]
async fn test_empty_queue_yields_nothing() {
    let (runtime, _) = runtime(Arc::new(StubGenerationClient::new()));
    let outcome = runtime.processor("w", &worker_config()).run_once().await.unwrap();
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_transient_failure_is_requeued_then_succeeds() {
    let client = Arc::new(FlakyClient {
        failures: 1,
        calls: AtomicU32::new(0),
    });
    let (runtime, store) = runtime(client);
    let processor = runtime.processor("w", &worker_config());
    let job = runtime.job_manager().create_job(1, image("p")).await.unwrap();

    let first = processor.run_once().await.unwrap().unwrap();
    let retry_id = assert_matches!(
        first,
        ProcessOutcome::Failed { job_id, requeued_as: Some(id) } if job_id == job.id => id
    );

    let failed = store.get(job.id, None).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.result.is_none());
    assert_eq!(
        failed.error.as_deref(),
        Some("The generation service returned an invalid response")
    );

    let second = processor.run_once().await.unwrap().unwrap();
    assert_eq!(second, ProcessOutcome::Completed { job_id: retry_id });

    let retry = store.get(retry_id, None).await.unwrap().unwrap();
    assert_eq!(retry.retry_of_job_id, Some(job.id));
    assert_eq!(retry.retry_count, 1);

    // Re-queues do not consume quota.
    let quota = store.check_quota(1).await.unwrap();
    assert_eq!(quota.daily_remaining, 49);
}

#[tokio::test]
async fn test_retries_stop_at_max_retries() {
    let client = Arc::new(FlakyClient {
        failures: u32::MAX,
        calls: AtomicU32::new(0),
    });
    let (runtime, store) = runtime(client);
    let processor = runtime.processor("w", &worker_config());
    let mut input = image("p");
    input.max_retries = Some(2);
    runtime.job_manager().create_job(1, input).await.unwrap();

    while processor.run_once().await.unwrap().is_some() {}

    let stats = store.stats(1).await.unwrap();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_rate_limited_retry_waits_for_the_window() {
    let store = Arc::new(MemoryJobStore::new());
    let config = PipelineConfig {
        rate_limit_max_requests: 1,
        rate_limit_window: Duration::from_secs(10),
        ..PipelineConfig::default()
    };
    let runtime = Runtime::assemble(
        StoreHandle::Memory(Arc::clone(&store)),
        Arc::new(StubGenerationClient::new()),
        &config,
    );
    let manager = runtime.job_manager();
    let first = manager.create_job(1, image("one")).await.unwrap();
    let second = manager.create_job(1, image("two")).await.unwrap();
    let processor = runtime.processor("w", &worker_config());

    assert_eq!(
        processor.run_once().await.unwrap(),
        Some(ProcessOutcome::Completed { job_id: first.id })
    );
    let retry_id = assert_matches!(
        processor.run_once().await.unwrap(),
        Some(ProcessOutcome::Failed { job_id, requeued_as: Some(id) }) if job_id == second.id => id
    );

    // The window is still full, so the new attempt is not handed out.
    assert!(processor.run_once().await.unwrap().is_none());

    let retry = store.get(retry_id, None).await.unwrap().unwrap();
    assert_eq!(retry.status, JobStatus::Pending);
    assert_eq!(retry.retry_count, 1);
    assert!(retry.available_at >= retry.created_at + chrono::Duration::seconds(1));

    let stats = store.stats(1).await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 1);
}

#[tokio::test]
async fn test_model_prefix_reaches_the_provider() {
    let client = Arc::new(RecordingClient::default());
    let config = PipelineConfig {
        provider_model_prefix: Some("eu".to_string()),
        ..PipelineConfig::default()
    };
    let runtime = Runtime::assemble(
        StoreHandle::Memory(Arc::new(MemoryJobStore::new())),
        Arc::clone(&client) as Arc<dyn GenerationClient>,
        &config,
    );
    runtime.job_manager().create_job(1, image("cube")).await.unwrap();

    let outcome = runtime.processor("w", &worker_config()).run_once().await.unwrap();
    assert_matches!(outcome, Some(ProcessOutcome::Completed { .. }));
    assert_eq!(*client.models.lock().unwrap(), vec!["eu/image-standard".to_string()]);
}

#[tokio::test]
async fn test_flagged_prompt_fails_without_retry() {
    let client = Arc::new(StubGenerationClient::new().with_blocked_terms(["forbidden"]));
    let (runtime, store) = runtime(client);
    let job = runtime
        .job_manager()
        .create_job(1, image("forbidden thing"))
        .await
        .unwrap();

    let outcome = runtime.processor("w", &worker_config()).run_once().await.unwrap();
    assert_eq!(
        outcome,
        Some(ProcessOutcome::Failed {
            job_id: job.id,
            requeued_as: None
        })
    );
    assert_eq!(store.stats(1).await.unwrap().total, 1);
}

#[tokio::test]
async fn test_cancel_during_provider_call_discards_result() {
    let client = Arc::new(StubGenerationClient::new().with_latency(Duration::from_millis(300)));
    let (runtime, store) = runtime(client);
    let manager = runtime.job_manager();
    let job = manager.create_job(1, image("slow")).await.unwrap();

    let processor = runtime.processor("w", &worker_config());
    let in_flight = tokio::spawn(async move { processor.run_once().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.cancel_job(1, job.id).await.unwrap());

    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome, Some(ProcessOutcome::Discarded { job_id: job.id }));

    let row = store.get(job.id, None).await.unwrap().unwrap();
    assert_eq!(row.status, JobStatus::Cancelled);
    assert!(row.result.is_none());
}

#[tokio::test]
async fn test_processor_pool_drains_queue_and_stops() {
    let (runtime, store) = runtime(Arc::new(StubGenerationClient::new()));
    let manager = runtime.job_manager();
    for i in 0..5 {
        manager.create_job(1, image(&format!("cube {i}"))).await.unwrap();
    }

    let cancel = CancellationToken::new();
    let handles = runtime.spawn_processors(&worker_config(), &cancel);

    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.stats(1).await.unwrap().completed == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "queue was not drained");

    cancel.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    let page = store.list(1, &JobListQuery::default()).await.unwrap();
    assert!(page.data.iter().all(|j| j.progress == 100));
}
