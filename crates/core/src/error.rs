use std::time::Duration;

use crate::types::DbId;

/// Domain error taxonomy shared by every layer of the pipeline.
///
/// Lower layers (`StoreError`, `ProviderError`) convert into this type so
/// that the orchestrator, the processor and the HTTP layer reason about one
/// set of failure kinds.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        /// Seconds until the limiting window frees a slot.
        retry_after_secs: u64,
    },

    #[error("Quota exceeded: {daily_remaining} daily and {monthly_remaining} monthly generations remaining")]
    QuotaExceeded {
        daily_remaining: i32,
        monthly_remaining: i32,
    },

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Provider call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Message safe to store in `Job.error` and show to end users.
    ///
    /// Database and internal failures are collapsed into a generic sentence;
    /// provider bodies are not echoed back.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::NotFound { entity, .. } => format!("{entity} not found"),
            CoreError::Validation(msg) => format!("Invalid request: {msg}"),
            CoreError::RateLimited { .. } => {
                "Too many requests, please wait a moment and try again".to_string()
            }
            CoreError::QuotaExceeded {
                daily_remaining,
                monthly_remaining,
            } => format!(
                "Generation quota exhausted ({daily_remaining} remaining today, \
                 {monthly_remaining} remaining this month)"
            ),
            CoreError::ExternalApi(_) => {
                "The generation service returned an invalid response".to_string()
            }
            CoreError::Timeout { .. } => "The generation service took too long to respond".to_string(),
            CoreError::Conflict(msg) => msg.clone(),
            CoreError::Unauthorized(_) => "Authentication required".to_string(),
            CoreError::Forbidden(_) => "Not allowed".to_string(),
            CoreError::Database(_) | CoreError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    /// Whether a fresh attempt of the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::RateLimited { .. }
                | CoreError::ExternalApi(_)
                | CoreError::Timeout { .. }
                | CoreError::Database(_)
        )
    }

    /// How long a fresh attempt should wait before it may run.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RateLimited {
                retry_after_secs, ..
            } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }

    /// Short metric / log label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "not_found",
            CoreError::Validation(_) => "validation",
            CoreError::RateLimited { .. } => "rate_limited",
            CoreError::QuotaExceeded { .. } => "quota_exceeded",
            CoreError::ExternalApi(_) => "external_api",
            CoreError::Timeout { .. } => "timeout",
            CoreError::Database(_) => "database",
            CoreError::Conflict(_) => "conflict",
            CoreError::Unauthorized(_) => "unauthorized",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_message_is_sanitized() {
        let err = CoreError::Database("relation \"jobs\" does not exist at 10.0.0.4".into());
        let msg = err.user_message();
        assert_eq!(msg, "An internal error occurred");
        assert!(!msg.contains("10.0.0.4"));
    }

    #[test]
    fn provider_body_is_not_echoed() {
        let err = CoreError::ExternalApi("502 upstream: trace id 9f8e".into());
        assert!(!err.user_message().contains("9f8e"));
    }

    #[test]
    fn quota_message_carries_both_counters() {
        let err = CoreError::QuotaExceeded {
            daily_remaining: 0,
            monthly_remaining: 12,
        };
        let msg = err.user_message();
        assert!(msg.contains("0 remaining today"));
        assert!(msg.contains("12 remaining this month"));
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(CoreError::Timeout { secs: 5 }.is_retryable());
        assert!(CoreError::ExternalApi("x".into()).is_retryable());
        assert!(CoreError::RateLimited {
            message: "x".into(),
            retry_after_secs: 3,
        }
        .is_retryable());
        assert!(!CoreError::Validation("x".into()).is_retryable());
        assert!(!CoreError::Forbidden("x".into()).is_retryable());
    }

    #[test]
    fn only_rate_limits_carry_a_wait() {
        let err = CoreError::RateLimited {
            message: "window full".into(),
            retry_after_secs: 7,
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(CoreError::Timeout { secs: 5 }.retry_after(), None);
    }
}
