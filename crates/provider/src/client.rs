use async_trait::async_trait;
use genflow_core::job::JobType;
use genflow_core::output::ProviderOutput;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// A provider-ready generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub model: String,
    pub prompt: String,
    /// Type-specific knobs (dimensions, durations, formats...).
    pub parameters: serde_json::Value,
    /// User-authored text that must pass moderation before the call.
    #[serde(skip)]
    pub free_text: Option<String>,
}

/// Outcome of a content-safety check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Moderation {
    pub flagged: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// The external generation service.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput, ProviderError>;

    async fn moderate(&self, text: &str) -> Result<Moderation, ProviderError>;
}
