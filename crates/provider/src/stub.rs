//! Local provider returning deterministic results.
//!
//! Used for `PROVIDER_MODE=stub` and as the default fake in tests. Output is
//! a pure function of the request so cached and fresh results agree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use genflow_core::hashing::sha256_hex_parts;
use genflow_core::job::JobType;
use genflow_core::output::ProviderOutput;
use serde_json::json;

use crate::client::{GenerationClient, Moderation, ProviderRequest};
use crate::error::ProviderError;

#[derive(Debug, Default)]
pub struct StubGenerationClient {
    latency: Duration,
    blocked_terms: Vec<String>,
    generate_calls: AtomicU64,
    moderate_calls: AtomicU64,
}

impl StubGenerationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `generate` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Flag any text containing one of `terms` (case-insensitive).
    pub fn with_blocked_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_terms = terms.into_iter().map(|t| t.into().to_lowercase()).collect();
        self
    }

    pub fn generate_calls(&self) -> u64 {
        self.generate_calls.load(Ordering::Relaxed)
    }

    pub fn moderate_calls(&self) -> u64 {
        self.moderate_calls.load(Ordering::Relaxed)
    }
}

fn artifact_url(kind: &str, digest: &str, ext: &str) -> String {
    format!("https://stub.genflow.local/{kind}/{digest}.{ext}")
}

#[async_trait]
impl GenerationClient for StubGenerationClient {
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderOutput, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let digest = sha256_hex_parts(&[
            request.job_type.as_str().as_bytes(),
            request.prompt.as_bytes(),
            request.parameters.to_string().as_bytes(),
        ]);
        let digest = &digest[..16];

        let output = match request.job_type {
            JobType::ImageGeneration | JobType::GraphicDesign => {
                let count = request.parameters["count"].as_u64().unwrap_or(1);
                let images: Vec<String> = (0..count)
                    .map(|i| artifact_url("images", &format!("{digest}-{i}"), "png"))
                    .collect();
                ProviderOutput::Structured(json!({ "images": images }))
            }
            JobType::TextGeneration => {
                ProviderOutput::Text(format!("Generated text for: {}", request.prompt))
            }
            JobType::VideoCreation => ProviderOutput::Structured(
                json!({ "video_url": artifact_url("videos", digest, "mp4") }),
            ),
            JobType::MusicComposition => ProviderOutput::Structured(
                json!({ "audio_url": artifact_url("audio", digest, "mp3") }),
            ),
            JobType::ThreeDModeling => {
                let ext = request.parameters["format"].as_str().unwrap_or("glb");
                ProviderOutput::Structured(json!({ "model_url": artifact_url("models", digest, ext) }))
            }
        };
        Ok(output)
    }

    async fn moderate(&self, text: &str) -> Result<Moderation, ProviderError> {
        self.moderate_calls.fetch_add(1, Ordering::Relaxed);
        let lowered = text.to_lowercase();
        let categories: Vec<String> = self
            .blocked_terms
            .iter()
            .filter(|term| lowered.contains(term.as_str()))
            .cloned()
            .collect();
        Ok(Moderation {
            flagged: !categories.is_empty(),
            categories,
        })
    }
}
