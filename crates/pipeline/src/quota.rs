use std::sync::Arc;

use genflow_core::error::CoreError;
use genflow_core::quota::QuotaStatus;
use genflow_core::types::DbId;
use genflow_db::JobStore;

/// Admission decision for a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted(QuotaStatus),
    Denied(QuotaStatus),
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted(_))
    }

    /// Turn a denial into `CoreError::QuotaExceeded`.
    pub fn into_result(self) -> Result<QuotaStatus, CoreError> {
        match self {
            Admission::Granted(status) => Ok(status),
            Admission::Denied(status) => Err(CoreError::QuotaExceeded {
                daily_remaining: status.daily_remaining,
                monthly_remaining: status.monthly_remaining,
            }),
        }
    }
}

/// Per-owner quota gate over the store's quota primitives.
pub struct QuotaGuard {
    store: Arc<dyn JobStore>,
}

impl QuotaGuard {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn admit(&self, owner_id: DbId) -> Result<Admission, CoreError> {
        let status = self.store.check_quota(owner_id).await?;
        if status.can_proceed {
            Ok(Admission::Granted(status))
        } else {
            tracing::info!(
                owner_id,
                daily_remaining = status.daily_remaining,
                monthly_remaining = status.monthly_remaining,
                "Quota exhausted, job rejected",
            );
            Ok(Admission::Denied(status))
        }
    }

    /// Count one created job against the owner's quota.
    ///
    /// Failures are logged and swallowed: the job already exists and is not
    /// rolled back.
    pub async fn record_usage(&self, owner_id: DbId) {
        if let Err(e) = self.store.increment_quota(owner_id).await {
            tracing::warn!(owner_id, error = %e, "Failed to increment quota");
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use genflow_core::quota::QuotaLimits;
    use genflow_db::MemoryJobStore;

    use super::*;

    #[tokio::test]
    async fn grants_until_exhausted_then_denies() {
        let store = Arc::new(MemoryJobStore::with_quota_limits(QuotaLimits { daily: 1, monthly: 5 }));
        let guard = QuotaGuard::new(store);

        assert!(guard.admit(1).await.unwrap().is_granted());
        guard.record_usage(1).await;

        let denied = guard.admit(1).await.unwrap();
        assert_matches!(denied, Admission::Denied(s) if s.daily_remaining == 0 && s.monthly_remaining == 4);
        assert_matches!(
            denied.into_result(),
            Err(CoreError::QuotaExceeded { daily_remaining: 0, monthly_remaining: 4 })
        );
    }
}
