use std::time::Duration;

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::rate_limit::{FailurePolicy, DEFAULT_MAX_REQUESTS};

/// Which provider client to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Http,
    Stub,
}

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub rate_limit_max_requests: u32,
    pub rate_limit_window: Duration,
    pub rate_limit_failure_policy: FailurePolicy,
    pub cache_max_entries: u64,
    pub provider_timeout: Duration,
    pub provider_mode: ProviderMode,
    /// Required when `provider_mode` is [`ProviderMode::Http`].
    pub provider_url: Option<String>,
    pub provider_api_key: Option<String>,
    /// Prepended to every model name sent to the provider.
    pub provider_model_prefix: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_requests: DEFAULT_MAX_REQUESTS,
            rate_limit_window: Duration::from_secs(10),
            rate_limit_failure_policy: FailurePolicy::Open,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            provider_timeout: Duration::from_secs(120),
            provider_mode: ProviderMode::Stub,
            provider_url: None,
            provider_api_key: None,
            provider_model_prefix: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                          |
    /// |-----------------------------|----------------------------------|
    /// | `RATE_LIMIT_MAX_REQUESTS`   | `10`                             |
    /// | `RATE_LIMIT_WINDOW_SECS`    | `10`                             |
    /// | `RATE_LIMIT_FAILURE_POLICY` | `open`                           |
    /// | `CACHE_MAX_ENTRIES`         | `10000`                          |
    /// | `PROVIDER_TIMEOUT_SECS`     | `120`                            |
    /// | `PROVIDER_MODE`             | `http` if `PROVIDER_URL` is set  |
    /// | `PROVIDER_URL`              | unset                            |
    /// | `PROVIDER_API_KEY`          | unset                            |
    /// | `PROVIDER_MODEL_PREFIX`     | unset                            |
    pub fn from_env() -> Self {
        let rate_limit_max_requests: u32 = std::env::var("RATE_LIMIT_MAX_REQUESTS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("RATE_LIMIT_MAX_REQUESTS must be a valid u32");

        let rate_limit_window_secs: u64 = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("RATE_LIMIT_WINDOW_SECS must be a valid u64");

        let rate_limit_failure_policy: FailurePolicy = std::env::var("RATE_LIMIT_FAILURE_POLICY")
            .unwrap_or_else(|_| "open".into())
            .parse()
            .expect("RATE_LIMIT_FAILURE_POLICY must be 'open' or 'closed'");

        let cache_max_entries: u64 = std::env::var("CACHE_MAX_ENTRIES")
            .unwrap_or_else(|_| DEFAULT_MAX_ENTRIES.to_string())
            .parse()
            .expect("CACHE_MAX_ENTRIES must be a valid u64");

        let provider_timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");

        let provider_url = std::env::var("PROVIDER_URL").ok().filter(|s| !s.is_empty());
        let provider_api_key = std::env::var("PROVIDER_API_KEY").ok().filter(|s| !s.is_empty());
        let provider_model_prefix = std::env::var("PROVIDER_MODEL_PREFIX")
            .ok()
            .filter(|s| !s.is_empty());

        let provider_mode = match std::env::var("PROVIDER_MODE") {
            Ok(mode) => match mode.trim().to_ascii_lowercase().as_str() {
                "http" => ProviderMode::Http,
                "stub" => ProviderMode::Stub,
                other => panic!("PROVIDER_MODE must be 'http' or 'stub', got '{other}'"),
            },
            Err(_) if provider_url.is_some() => ProviderMode::Http,
            Err(_) => ProviderMode::Stub,
        };

        if provider_mode == ProviderMode::Http && provider_url.is_none() {
            panic!("PROVIDER_URL must be set when PROVIDER_MODE is 'http'");
        }

        Self {
            rate_limit_max_requests,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            rate_limit_failure_policy,
            cache_max_entries,
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            provider_mode,
            provider_url,
            provider_api_key,
            provider_model_prefix,
        }
    }
}
