//! Per-type payload validation, normalization and cache-key derivation.
//!
//! A payload is a JSON object with a required `prompt` plus a small set of
//! optional, type-specific fields. Normalization trims strings, drops
//! explicit `null`s and relies on `serde_json::Map` key ordering so that two
//! semantically equal payloads serialize to the same bytes.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::hashing::sha256_hex_parts;
use crate::job::JobType;
use crate::types::DbId;

/// Maximum prompt length in characters, after trimming.
pub const MAX_PROMPT_LEN: usize = 4000;

/// Maximum length of any other free-text field.
const MAX_TEXT_FIELD_LEN: usize = 200;

/// Maximum number of entries in a list field (e.g. `palette`).
const MAX_LIST_LEN: usize = 16;

const MODEL_FORMATS: &[&str] = &["glb", "obj", "fbx"];

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum FieldRule {
    Text,
    IntRange(i64, i64),
    OneOf(&'static [&'static str]),
    TextList,
}

fn optional_fields(job_type: JobType) -> &'static [(&'static str, FieldRule)] {
    match job_type {
        JobType::ImageGeneration => &[
            ("style", FieldRule::Text),
            ("width", FieldRule::IntRange(64, 2048)),
            ("height", FieldRule::IntRange(64, 2048)),
            ("count", FieldRule::IntRange(1, 4)),
        ],
        JobType::TextGeneration => &[
            ("max_tokens", FieldRule::IntRange(1, 8192)),
            ("tone", FieldRule::Text),
        ],
        JobType::VideoCreation => &[
            ("duration_secs", FieldRule::IntRange(1, 300)),
            ("aspect_ratio", FieldRule::Text),
        ],
        JobType::MusicComposition => &[
            ("duration_secs", FieldRule::IntRange(5, 600)),
            ("genre", FieldRule::Text),
        ],
        JobType::ThreeDModeling => &[("format", FieldRule::OneOf(MODEL_FORMATS))],
        JobType::GraphicDesign => &[
            ("design_type", FieldRule::Text),
            ("palette", FieldRule::TextList),
        ],
    }
}

impl FieldRule {
    fn check(self, key: &str, value: &Value) -> Result<Value, CoreError> {
        match self {
            FieldRule::Text => Ok(Value::String(check_text(key, value, MAX_TEXT_FIELD_LEN)?)),
            FieldRule::IntRange(min, max) => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| CoreError::Validation(format!("'{key}' must be an integer")))?;
                if !(min..=max).contains(&n) {
                    return Err(CoreError::Validation(format!(
                        "'{key}' must be between {min} and {max}"
                    )));
                }
                Ok(Value::from(n))
            }
            FieldRule::OneOf(options) => {
                let text = check_text(key, value, MAX_TEXT_FIELD_LEN)?.to_lowercase();
                if !options.contains(&text.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "'{key}' must be one of: {}",
                        options.join(", ")
                    )));
                }
                Ok(Value::String(text))
            }
            FieldRule::TextList => {
                let items = value
                    .as_array()
                    .ok_or_else(|| CoreError::Validation(format!("'{key}' must be an array")))?;
                if items.len() > MAX_LIST_LEN {
                    return Err(CoreError::Validation(format!(
                        "'{key}' may contain at most {MAX_LIST_LEN} entries"
                    )));
                }
                items
                    .iter()
                    .map(|item| check_text(key, item, MAX_TEXT_FIELD_LEN).map(Value::String))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
        }
    }
}

fn check_text(key: &str, value: &Value, max_len: usize) -> Result<String, CoreError> {
    let text = value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| CoreError::Validation(format!("'{key}' must be a string")))?;
    if text.is_empty() {
        return Err(CoreError::Validation(format!("'{key}' must not be empty")));
    }
    if text.chars().count() > max_len {
        return Err(CoreError::Validation(format!(
            "'{key}' must not exceed {max_len} characters"
        )));
    }
    Ok(text.to_string())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate `payload` for `job_type` and return its normalized form.
pub fn validate_payload(job_type: JobType, payload: &Value) -> Result<Value, CoreError> {
    let fields = payload
        .as_object()
        .ok_or_else(|| CoreError::Validation("Payload must be a JSON object".to_string()))?;

    let prompt = fields
        .get("prompt")
        .ok_or_else(|| CoreError::Validation("'prompt' is required".to_string()))?;

    let mut normalized = Map::new();
    normalized.insert(
        "prompt".to_string(),
        Value::String(check_text("prompt", prompt, MAX_PROMPT_LEN)?),
    );

    let rules = optional_fields(job_type);
    for (key, value) in fields {
        if key == "prompt" || value.is_null() {
            continue;
        }
        let (_, rule) = rules
            .iter()
            .find(|(name, _)| *name == key.as_str())
            .ok_or_else(|| {
                CoreError::Validation(format!("Unknown field '{key}' for {job_type}"))
            })?;
        normalized.insert(key.clone(), rule.check(key, value)?);
    }

    Ok(Value::Object(normalized))
}

/// Deterministic response-cache key for one owner's normalized request.
///
/// `normalized` must come from [`validate_payload`]; its key order is
/// canonical so equal requests hash identically.
pub fn cache_key(job_type: JobType, normalized: &Value, owner_id: DbId) -> String {
    sha256_hex_parts(&[
        job_type.as_str().as_bytes(),
        owner_id.to_string().as_bytes(),
        normalized.to_string().as_bytes(),
    ])
}
