//! Payload → provider request.
//!
//! Pure function of the normalized payload: the same payload always yields
//! the same request, which is what makes cached results interchangeable
//! with fresh ones.

use genflow_core::error::CoreError;
use genflow_core::job::JobType;
use serde_json::{Map, Value};

use crate::client::ProviderRequest;

/// Builds [`ProviderRequest`]s from validated payloads.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    model_prefix: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every model name, e.g. to pin a provider deployment.
    pub fn with_model_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.model_prefix = Some(prefix.into());
        self
    }

    fn model_for(&self, job_type: JobType) -> String {
        let base = match job_type {
            JobType::ImageGeneration => "image-standard",
            JobType::TextGeneration => "text-standard",
            JobType::VideoCreation => "video-standard",
            JobType::MusicComposition => "audio-standard",
            JobType::ThreeDModeling => "mesh-standard",
            JobType::GraphicDesign => "design-standard",
        };
        match &self.model_prefix {
            Some(prefix) => format!("{prefix}/{base}"),
            None => base.to_string(),
        }
    }

    /// Build the request for a payload already passed through
    /// `validate_payload`.
    pub fn build(&self, job_type: JobType, normalized: &Value) -> Result<ProviderRequest, CoreError> {
        let fields = normalized
            .as_object()
            .ok_or_else(|| CoreError::Validation("Payload must be a JSON object".to_string()))?;
        let prompt = fields
            .get("prompt")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::Validation("'prompt' is required".to_string()))?;

        let mut parameters = Map::new();
        let mut qualifiers = Vec::new();
        for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "prompt") {
            match (job_type, key.as_str()) {
                // Descriptive fields are folded into the prompt text.
                (_, "style" | "tone" | "genre" | "design_type") => {
                    if let Some(text) = value.as_str() {
                        qualifiers.push(format!("{key}: {text}"));
                    }
                }
                (JobType::GraphicDesign, "palette") => {
                    let colors: Vec<&str> = value
                        .as_array()
                        .map(|items| items.iter().filter_map(Value::as_str).collect())
                        .unwrap_or_default();
                    if !colors.is_empty() {
                        qualifiers.push(format!("palette: {}", colors.join(", ")));
                    }
                }
                _ => {
                    parameters.insert(key.clone(), value.clone());
                }
            }
        }

        let text = if qualifiers.is_empty() {
            prompt.to_string()
        } else {
            format!("{prompt}\n\n{}", qualifiers.join("\n"))
        };

        Ok(ProviderRequest {
            job_type,
            model: self.model_for(job_type),
            prompt: text.clone(),
            parameters: Value::Object(parameters),
            free_text: Some(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_prompt_passes_through() {
        let req = PromptBuilder::new()
            .build(JobType::TextGeneration, &json!({"prompt": "hello", "max_tokens": 50}))
            .unwrap();
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.parameters, json!({"max_tokens": 50}));
        assert_eq!(req.model, "text-standard");
        assert_eq!(req.free_text.as_deref(), Some("hello"));
    }

    #[test]
    fn descriptive_fields_join_the_prompt() {
        let req = PromptBuilder::new()
            .build(
                JobType::GraphicDesign,
                &json!({"prompt": "logo", "design_type": "badge", "palette": ["red", "gold"]}),
            )
            .unwrap();
        assert!(req.prompt.starts_with("logo\n\n"));
        assert!(req.prompt.contains("design_type: badge"));
        assert!(req.prompt.contains("palette: red, gold"));
        assert_eq!(req.parameters, json!({}));
    }

    #[test]
    fn same_payload_same_request() {
        let builder = PromptBuilder::new().with_model_prefix("eu");
        let payload = json!({"prompt": "a cube", "width": 512, "style": "flat"});
        let a = builder.build(JobType::ImageGeneration, &payload).unwrap();
        let b = builder.build(JobType::ImageGeneration, &payload).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.model, "eu/image-standard");
    }

    #[test]
    fn missing_prompt_is_rejected() {
        assert!(PromptBuilder::new()
            .build(JobType::ImageGeneration, &json!({"width": 64}))
            .is_err());
    }
}
