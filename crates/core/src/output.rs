//! Validation of provider responses against the shape expected per job type.
//!
//! A response that does not match is an `ExternalApi` error; it is never
//! stored as a job result or cached.

use serde_json::{json, Value};

use crate::error::CoreError;
use crate::job::JobType;

/// What a provider handed back, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutput {
    /// A JSON document.
    Structured(Value),
    /// A plain-text body.
    Text(String),
}

enum Expected {
    UrlList(&'static str),
    Url(&'static str),
    Text(&'static str),
}

fn expected_shape(job_type: JobType) -> Expected {
    match job_type {
        JobType::ImageGeneration | JobType::GraphicDesign => Expected::UrlList("images"),
        JobType::TextGeneration => Expected::Text("text"),
        JobType::VideoCreation => Expected::Url("video_url"),
        JobType::MusicComposition => Expected::Url("audio_url"),
        JobType::ThreeDModeling => Expected::Url("model_url"),
    }
}

/// Validate `output` for `job_type`, returning the result document to store.
pub fn validate_output(job_type: JobType, output: ProviderOutput) -> Result<Value, CoreError> {
    let document = match output {
        ProviderOutput::Structured(value) => value,
        ProviderOutput::Text(text) if job_type == JobType::TextGeneration => json!({ "text": text }),
        ProviderOutput::Text(_) => {
            return Err(CoreError::ExternalApi(format!(
                "Expected a JSON document for {job_type}, got plain text"
            )))
        }
    };

    if !document.is_object() {
        return Err(CoreError::ExternalApi(format!(
            "Expected a JSON object for {job_type}"
        )));
    }

    let ok = match expected_shape(job_type) {
        Expected::UrlList(field) => document[field]
            .as_array()
            .is_some_and(|items| {
                !items.is_empty()
                    && items
                        .iter()
                        .all(|i| i.as_str().is_some_and(|s| !s.trim().is_empty()))
            }),
        Expected::Url(field) | Expected::Text(field) => document[field]
            .as_str()
            .is_some_and(|s| !s.trim().is_empty()),
    };

    if !ok {
        let field = match expected_shape(job_type) {
            Expected::UrlList(f) | Expected::Url(f) | Expected::Text(f) => f,
        };
        return Err(CoreError::ExternalApi(format!(
            "Provider response for {job_type} is missing a valid '{field}'"
        )));
    }

    Ok(document)
}
