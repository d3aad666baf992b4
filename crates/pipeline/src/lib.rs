//! The per-job generation pipeline and its admission controls.
//!
//! Everything here is constructed once at start-up and shared via `Arc`;
//! nothing is global.

pub mod cache;
pub mod config;
pub mod handlers;
pub mod manager;
pub mod metrics;
pub mod orchestrator;
pub mod quota;
pub mod rate_limit;

pub use cache::ResponseCache;
pub use config::{PipelineConfig, ProviderMode};
pub use handlers::{GenerationHandler, HandlerRegistry, JobHandler};
pub use manager::{CreateJob, JobManager};
pub use metrics::PipelineMetrics;
pub use orchestrator::{NoopProgress, Orchestrator, ProgressReporter, StoreProgress};
pub use quota::{Admission, QuotaGuard};
pub use rate_limit::{FailurePolicy, MemoryWindowStore, RateDecision, RateLimiter, WindowStore};
