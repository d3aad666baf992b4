//! The external AI generation provider.
//!
//! The pipeline depends on [`GenerationClient`] only. [`HttpGenerationClient`]
//! talks to a real provider over HTTP; [`StubGenerationClient`] answers
//! locally with deterministic results. [`PromptBuilder`] turns a normalized
//! job payload into a [`ProviderRequest`].

pub mod client;
pub mod error;
pub mod http;
pub mod prompt;
pub mod stub;

pub use client::{GenerationClient, Moderation, ProviderRequest};
pub use error::ProviderError;
pub use http::HttpGenerationClient;
pub use prompt::PromptBuilder;
pub use stub::StubGenerationClient;
