//! The per-job generation pipeline.
//!
//! validate → cache → rate limit → build request → moderate → provider
//! (bounded by a timeout) → validate output → cache → metrics.
//!
//! Every step short-circuits with a typed [`CoreError`]. A cache hit skips
//! everything between the cache lookup and the metrics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use genflow_core::error::CoreError;
use genflow_core::job::{
    PROGRESS_REQUEST_SENT, PROGRESS_RESPONSE_RECEIVED, PROGRESS_VALIDATED,
};
use genflow_core::output::validate_output;
use genflow_core::payload::{cache_key, validate_payload};
use genflow_core::types::DbId;
use genflow_db::models::job::Job;
use genflow_db::JobStore;
use genflow_provider::{GenerationClient, PromptBuilder};
use serde_json::Value;

use crate::cache::ResponseCache;
use crate::metrics::PipelineMetrics;
use crate::rate_limit::RateLimiter;

/// Default upper bound for one provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Sink for coarse progress milestones.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, progress: i16);
}

/// Ignores progress.
pub struct NoopProgress;

#[async_trait]
impl ProgressReporter for NoopProgress {
    async fn report(&self, _progress: i16) {}
}

/// Writes progress to the job row.
pub struct StoreProgress {
    store: Arc<dyn JobStore>,
    job_id: DbId,
}

impl StoreProgress {
    pub fn new(store: Arc<dyn JobStore>, job_id: DbId) -> Self {
        Self { store, job_id }
    }
}

#[async_trait]
impl ProgressReporter for StoreProgress {
    async fn report(&self, progress: i16) {
        if let Err(e) = self.store.update_progress(self.job_id, progress).await {
            tracing::error!(job_id = self.job_id, progress, error = %e, "Failed to update job progress");
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    client: Arc<dyn GenerationClient>,
    cache: Arc<ResponseCache>,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<PipelineMetrics>,
    prompt_builder: PromptBuilder,
    provider_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        cache: Arc<ResponseCache>,
        rate_limiter: Arc<RateLimiter>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            client,
            cache,
            rate_limiter,
            metrics,
            prompt_builder: PromptBuilder::new(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_prompt_builder(mut self, builder: PromptBuilder) -> Self {
        self.prompt_builder = builder;
        self
    }

    /// Run `job` through the pipeline and return the result to store.
    pub async fn run(&self, job: &Job, progress: &dyn ProgressReporter) -> Result<Value, CoreError> {
        let started = Instant::now();
        let outcome = self.execute(job, progress).await;
        let latency = started.elapsed();

        match &outcome {
            Ok((_, cache_hit)) => self.metrics.record_success(job.job_type, latency, *cache_hit),
            Err(e) => self.metrics.record_failure(job.job_type, e, latency),
        }
        outcome.map(|(value, _)| value)
    }

    async fn execute(
        &self,
        job: &Job,
        progress: &dyn ProgressReporter,
    ) -> Result<(Value, bool), CoreError> {
        let normalized = validate_payload(job.job_type, &job.payload)?;
        progress.report(PROGRESS_VALIDATED).await;

        let key = cache_key(job.job_type, &normalized, job.owner_id);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(job_id = job.id, "Response cache hit");
            return Ok((cached, true));
        }

        let decision = self.rate_limiter.limit(&job.owner_id.to_string()).await;
        if !decision.allowed {
            let retry_after_secs = decision.reset_after.as_secs().max(1);
            return Err(CoreError::RateLimited {
                message: format!(
                    "owner {} exceeded the request rate, retry in {retry_after_secs}s",
                    job.owner_id
                ),
                retry_after_secs,
            });
        }

        let request = self.prompt_builder.build(job.job_type, &normalized)?;

        if let Some(text) = &request.free_text {
            let moderation = self.bounded(self.client.moderate(text)).await?;
            if moderation.flagged {
                tracing::info!(
                    job_id = job.id,
                    categories = ?moderation.categories,
                    "Prompt rejected by moderation",
                );
                return Err(CoreError::Validation(
                    "Prompt was flagged by content moderation".to_string(),
                ));
            }
        }

        progress.report(PROGRESS_REQUEST_SENT).await;
        let output = self.bounded(self.client.generate(&request)).await?;
        progress.report(PROGRESS_RESPONSE_RECEIVED).await;

        let result = validate_output(job.job_type, output)?;
        self.cache.set(key, result.clone(), job.job_type.cache_ttl());
        Ok((result, false))
    }

    /// Apply the provider timeout to one provider call.
    async fn bounded<T, F>(&self, call: F) -> Result<T, CoreError>
    where
        F: std::future::Future<Output = Result<T, genflow_provider::ProviderError>>,
    {
        match tokio::time::timeout(self.provider_timeout, call).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::Timeout {
                secs: self.provider_timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use assert_matches::assert_matches;
    use chrono::Utc;
    use genflow_core::job::{JobStatus, JobType};
    use genflow_core::output::ProviderOutput;
    use genflow_provider::{Moderation, ProviderError, ProviderRequest, StubGenerationClient};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;
    use crate::rate_limit::FailurePolicy;

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    /// Provider returning a fixed output.
    struct FixedClient {
        output: ProviderOutput,
        calls: AtomicU64,
    }

    impl FixedClient {
        fn new(output: ProviderOutput) -> Self {
            Self {
                output,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for FixedClient {
        async fn generate(&self, _: &ProviderRequest) -> Result<ProviderOutput, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.output.clone())
        }

        async fn moderate(&self, _: &str) -> Result<Moderation, ProviderError> {
            Ok(Moderation::default())
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<i16>>);

    #[async_trait]
    impl ProgressReporter for RecordingProgress {
        async fn report(&self, progress: i16) {
            self.0.lock().await.push(progress);
        }
    }

    fn job(job_type: JobType, payload: Value) -> Job {
        let now = Utc::now();
        Job {
            id: 1,
            owner_id: 42,
            job_type,
            payload,
            status: JobStatus::Processing,
            progress: 10,
            priority: 0,
            retry_count: 0,
            max_retries: 3,
            retry_of_job_id: None,
            worker_id: Some("w".into()),
            estimated_duration_secs: None,
            actual_duration_secs: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            available_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }

    fn orchestrator(client: Arc<dyn GenerationClient>) -> (Orchestrator, Arc<PipelineMetrics>) {
        let metrics = Arc::new(PipelineMetrics::new());
        let orch = Orchestrator::new(
            client,
            Arc::new(ResponseCache::default()),
            Arc::new(RateLimiter::in_memory(10, Duration::from_secs(10), FailurePolicy::Open)),
            Arc::clone(&metrics),
        );
        (orch, metrics)
    }

    // -----------------------------------------------------------------------
    // Happy path and cache
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn successful_run_reports_milestones_in_order() {
        let (orch, metrics) = orchestrator(Arc::new(StubGenerationClient::new()));
        let progress = RecordingProgress::default();

        let result = orch
            .run(&job(JobType::ImageGeneration, json!({"prompt": "a red cube"})), &progress)
            .await
            .unwrap();

        assert!(result["images"].is_array());
        assert_eq!(*progress.0.lock().await, vec![30, 50, 80]);
        assert_eq!(metrics.snapshot().by_type["image-generation"].successes, 1);
    }

    #[tokio::test]
    async fn second_identical_run_is_served_from_cache() {
        let client = Arc::new(StubGenerationClient::new());
        let (orch, metrics) = orchestrator(client.clone());
        let j = job(JobType::TextGeneration, json!({"prompt": "  haiku  "}));

        let first = orch.run(&j, &NoopProgress).await.unwrap();
        let second = orch
            .run(&job(JobType::TextGeneration, json!({"prompt": "haiku"})), &NoopProgress)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(client.generate_calls(), 1);
        assert_eq!(metrics.snapshot().by_type["text-generation"].cache_hits, 1);
    }

    #[tokio::test]
    async fn plain_text_reply_is_wrapped() {
        let client = Arc::new(FixedClient::new(ProviderOutput::Text("hello".into())));
        let (orch, _) = orchestrator(client);
        let result = orch
            .run(&job(JobType::TextGeneration, json!({"prompt": "greet"})), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(result, json!({"text": "hello"}));
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn invalid_payload_fails_before_provider() {
        let client = Arc::new(StubGenerationClient::new());
        let (orch, _) = orchestrator(client.clone());
        let err = orch
            .run(&job(JobType::ImageGeneration, json!({"width": 10})), &NoopProgress)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert_eq!(client.generate_calls(), 0);
    }

    #[tokio::test]
    async fn malformed_provider_response_is_external_api_error_and_not_cached() {
        let client = Arc::new(FixedClient::new(ProviderOutput::Structured(json!({"oops": true}))));
        let (orch, metrics) = orchestrator(client.clone());
        let j = job(JobType::VideoCreation, json!({"prompt": "sunset"}));

        assert_matches!(orch.run(&j, &NoopProgress).await, Err(CoreError::ExternalApi(_)));
        assert_matches!(orch.run(&j, &NoopProgress).await, Err(CoreError::ExternalApi(_)));
        assert_eq!(client.calls.load(Ordering::Relaxed), 2);
        assert_eq!(
            metrics.snapshot().by_type["video-creation"].failures_by_kind["external_api"],
            2
        );
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let client = Arc::new(StubGenerationClient::new().with_latency(Duration::from_millis(500)));
        let (orch, _) = orchestrator(client);
        let orch = orch.with_provider_timeout(Duration::from_millis(50));

        let err = orch
            .run(&job(JobType::MusicComposition, json!({"prompt": "jazz"})), &NoopProgress)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Timeout { .. });
    }

    #[tokio::test]
    async fn flagged_prompt_is_rejected() {
        let client = Arc::new(StubGenerationClient::new().with_blocked_terms(["forbidden"]));
        let (orch, _) = orchestrator(client.clone());
        let err = orch
            .run(
                &job(JobType::ImageGeneration, json!({"prompt": "something forbidden"})),
                &NoopProgress,
            )
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("moderation"));
        assert_eq!(client.generate_calls(), 0);
    }

    #[tokio::test]
    async fn rate_limit_rejects_after_window_is_full() {
        let client = Arc::new(StubGenerationClient::new());
        let orch = Orchestrator::new(
            client,
            Arc::new(ResponseCache::default()),
            Arc::new(RateLimiter::in_memory(1, Duration::from_secs(10), FailurePolicy::Open)),
            Arc::new(PipelineMetrics::new()),
        );

        orch.run(&job(JobType::ImageGeneration, json!({"prompt": "one"})), &NoopProgress)
            .await
            .unwrap();
        let err = orch
            .run(&job(JobType::ImageGeneration, json!({"prompt": "two"})), &NoopProgress)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            CoreError::RateLimited { retry_after_secs, .. } if (1..=10).contains(&retry_after_secs)
        );
    }
}
