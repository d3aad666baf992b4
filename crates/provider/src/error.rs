use genflow_core::error::CoreError;

/// Wait applied before retrying after the provider answers 429.
pub const PROVIDER_THROTTLE_BACKOFF_SECS: u64 = 30;

/// Errors from the provider transport layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The request did not finish within the client timeout.
    #[error("Provider request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider returned a non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The provider answered 2xx with a body we cannot interpret.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl From<ProviderError> for CoreError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout { secs } => CoreError::Timeout { secs },
            ProviderError::Api { status: 429, .. } => CoreError::RateLimited {
                message: "Provider is throttling requests".to_string(),
                retry_after_secs: PROVIDER_THROTTLE_BACKOFF_SECS,
            },
            other => CoreError::ExternalApi(other.to_string()),
        }
    }
}
