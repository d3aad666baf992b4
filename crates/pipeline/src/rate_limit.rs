//! Sliding-window rate limiter keyed by caller identifier.
//!
//! The window log lives behind [`WindowStore`] so a shared backend can be
//! swapped in. When the store errors, [`FailurePolicy`] decides whether the
//! request is let through or rejected; either way the degraded decision is
//! logged.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::sync::Cache;

/// Default number of requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 10;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// The backing store could not serve a rate-limit lookup.
#[derive(Debug, thiserror::Error)]
#[error("Rate limit store unavailable: {0}")]
pub struct WindowStoreError(pub String);

/// Outcome of one hit against the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window.
    pub reset_after: Duration,
}

/// Storage of per-identifier request timestamps.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Atomically check the window for `key` and, if below `limit`, record
    /// a request at the current instant.
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<WindowHit, WindowStoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

type WindowLog = Arc<Mutex<VecDeque<Instant>>>;

/// Process-local [`WindowStore`]. Idle identifiers are dropped once their
/// window has fully elapsed.
pub struct MemoryWindowStore {
    logs: Cache<String, WindowLog>,
}

impl MemoryWindowStore {
    pub fn new(max_identifiers: u64, window: Duration) -> Self {
        let logs = Cache::builder()
            .max_capacity(max_identifiers)
            .time_to_idle(window)
            .build();
        Self { logs }
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<WindowHit, WindowStoreError> {
        let log = self
            .logs
            .get_with_by_ref(key, || Arc::new(Mutex::new(VecDeque::new())));
        let mut log = log
            .lock()
            .map_err(|_| WindowStoreError("window log poisoned".to_string()))?;

        let now = Instant::now();
        while log
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= window)
        {
            log.pop_front();
        }

        let allowed = (log.len() as u32) < limit;
        if allowed {
            log.push_back(now);
        }
        let reset_after = log
            .front()
            .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default();

        Ok(WindowHit {
            allowed,
            remaining: limit.saturating_sub(log.len() as u32),
            reset_after,
        })
    }
}

// ---------------------------------------------------------------------------
// Limiter
// ---------------------------------------------------------------------------

/// What to do when the window store is unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Allow the request.
    #[default]
    Open,
    /// Reject the request.
    Closed,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(FailurePolicy::Open),
            "closed" => Ok(FailurePolicy::Closed),
            other => Err(format!("unknown rate limit failure policy '{other}'")),
        }
    }
}

/// Admission decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after: Duration,
    /// The store failed and the failure policy decided.
    pub degraded: bool,
}

pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    max_requests: u32,
    window: Duration,
    failure_policy: FailurePolicy,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn WindowStore>,
        max_requests: u32,
        window: Duration,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            store,
            max_requests,
            window,
            failure_policy,
        }
    }

    /// Limiter over a [`MemoryWindowStore`].
    pub fn in_memory(max_requests: u32, window: Duration, failure_policy: FailurePolicy) -> Self {
        let store = Arc::new(MemoryWindowStore::new(100_000, window));
        Self::new(store, max_requests, window, failure_policy)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count one request for `identifier`.
    pub async fn limit(&self, identifier: &str) -> RateDecision {
        match self.store.hit(identifier, self.max_requests, self.window).await {
            Ok(hit) => RateDecision {
                allowed: hit.allowed,
                remaining: hit.remaining,
                reset_after: hit.reset_after,
                degraded: false,
            },
            Err(e) => {
                let allowed = self.failure_policy == FailurePolicy::Open;
                tracing::warn!(
                    identifier,
                    error = %e,
                    policy = ?self.failure_policy,
                    allowed,
                    "Rate limit store unavailable, applying failure policy",
                );
                RateDecision {
                    allowed,
                    remaining: 0,
                    reset_after: Duration::ZERO,
                    degraded: true,
                }
            }
        }
    }
}
