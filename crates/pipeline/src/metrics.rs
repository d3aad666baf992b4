//! Per-job-type counters and latency for orchestrator runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use genflow_core::error::CoreError;
use genflow_core::job::JobType;
use serde::Serialize;

#[derive(Debug, Default, Clone)]
struct Counters {
    successes: u64,
    cache_hits: u64,
    failures: BTreeMap<&'static str, u64>,
    total_latency: Duration,
    max_latency: Duration,
    runs: u64,
}

impl Counters {
    fn observe(&mut self, latency: Duration) {
        self.runs += 1;
        self.total_latency += latency;
        self.max_latency = self.max_latency.max(latency);
    }
}

/// Point-in-time view of one job type's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMetrics {
    pub successes: u64,
    pub cache_hits: u64,
    pub failures: u64,
    pub failures_by_kind: BTreeMap<String, u64>,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub by_type: BTreeMap<String, TypeMetrics>,
}

/// Thread-safe metrics sink shared by every orchestrator instance.
#[derive(Default)]
pub struct PipelineMetrics {
    counters: Mutex<HashMap<JobType, Counters>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<F: FnOnce(&mut Counters)>(&self, job_type: JobType, f: F) {
        // Counters stay consistent even if a recorder panicked.
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(counters.entry(job_type).or_default());
    }

    pub fn record_success(&self, job_type: JobType, latency: Duration, cache_hit: bool) {
        self.with(job_type, |c| {
            c.successes += 1;
            if cache_hit {
                c.cache_hits += 1;
            }
            c.observe(latency);
        });
        tracing::debug!(
            job_type = %job_type,
            latency_ms = latency.as_millis() as u64,
            cache_hit,
            "Generation succeeded",
        );
    }

    pub fn record_failure(&self, job_type: JobType, error: &CoreError, latency: Duration) {
        let kind = error.kind();
        self.with(job_type, |c| {
            *c.failures.entry(kind).or_default() += 1;
            c.observe(latency);
        });
        tracing::debug!(
            job_type = %job_type,
            latency_ms = latency.as_millis() as u64,
            kind,
            "Generation failed",
        );
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let by_type = counters
            .iter()
            .map(|(job_type, c)| {
                let failures_by_kind: BTreeMap<String, u64> = c
                    .failures
                    .iter()
                    .map(|(kind, n)| (kind.to_string(), *n))
                    .collect();
                let avg_latency_ms = if c.runs == 0 {
                    0.0
                } else {
                    c.total_latency.as_secs_f64() * 1000.0 / c.runs as f64
                };
                let metrics = TypeMetrics {
                    successes: c.successes,
                    cache_hits: c.cache_hits,
                    failures: failures_by_kind.values().sum(),
                    failures_by_kind,
                    avg_latency_ms,
                    max_latency_ms: c.max_latency.as_millis() as u64,
                };
                (job_type.as_str().to_string(), metrics)
            })
            .collect();
        MetricsSnapshot { by_type }
    }
}
