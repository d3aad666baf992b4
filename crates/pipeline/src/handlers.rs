//! Job-type dispatch.
//!
//! The processor looks handlers up by [`JobType`]; adding a job type means
//! registering a handler, not editing the processor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use genflow_core::error::CoreError;
use genflow_core::job::JobType;
use genflow_db::models::job::Job;
use serde_json::Value;

use crate::orchestrator::{Orchestrator, ProgressReporter};

/// Executes one claimed job and returns its result document.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job, progress: &dyn ProgressReporter) -> Result<Value, CoreError>;
}

/// Handler that runs the job through an [`Orchestrator`].
pub struct GenerationHandler {
    orchestrator: Arc<Orchestrator>,
}

impl GenerationHandler {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobHandler for GenerationHandler {
    async fn handle(&self, job: &Job, progress: &dyn ProgressReporter) -> Result<Value, CoreError> {
        self.orchestrator.run(job, progress).await
    }
}

/// `JobType → handler` lookup table.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry routing every job type through `orchestrator`.
    pub fn with_orchestrator(orchestrator: Arc<Orchestrator>) -> Self {
        let handler: Arc<dyn JobHandler> = Arc::new(GenerationHandler::new(orchestrator));
        let mut registry = Self::new();
        for job_type in JobType::ALL {
            registry.register(job_type, Arc::clone(&handler));
        }
        registry
    }

    /// Register `handler` for `job_type`, replacing any previous one.
    pub fn register(&mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> &mut Self {
        self.handlers.insert(job_type, handler);
        self
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&job_type).cloned()
    }

    pub async fn dispatch(&self, job: &Job, progress: &dyn ProgressReporter) -> Result<Value, CoreError> {
        let handler = self.get(job.job_type).ok_or_else(|| {
            CoreError::Internal(format!("No handler registered for {}", job.job_type))
        })?;
        handler.handle(job, progress).await
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use genflow_core::job::JobStatus;
    use serde_json::json;

    use super::*;
    use crate::orchestrator::NoopProgress;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        async fn handle(&self, job: &Job, _: &dyn ProgressReporter) -> Result<Value, CoreError> {
            Ok(json!({ "text": job.payload["prompt"] }))
        }
    }

    fn job(job_type: JobType) -> Job {
        let now = Utc::now();
        Job {
            id: 1,
            owner_id: 1,
            job_type,
            payload: json!({"prompt": "ping"}),
            status: JobStatus::Processing,
            progress: 10,
            priority: 0,
            retry_count: 0,
            max_retries: 3,
            retry_of_job_id: None,
            worker_id: None,
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

    #[tokio::test]
    async fn dispatches_to_registered_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register(JobType::TextGeneration, Arc::new(Echo));
        let out = registry
            .dispatch(&job(JobType::TextGeneration), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(out, json!({"text": "ping"}));
    }

    #[tokio::test]
    async fn missing_handler_is_internal_error() {
        let registry = HandlerRegistry::new();
        let err = registry
            .dispatch(&job(JobType::ThreeDModeling), &NoopProgress)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Internal(msg) if msg.contains("3d-modeling"));
    }
}
