//! Per-owner generation quota values.

use serde::{Deserialize, Serialize};

/// Default number of jobs an owner may create per calendar day.
pub const DEFAULT_DAILY_LIMIT: i32 = 50;

/// Default number of jobs an owner may create per calendar month.
pub const DEFAULT_MONTHLY_LIMIT: i32 = 500;

/// Result of a quota check for one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub can_proceed: bool,
    pub daily_remaining: i32,
    pub monthly_remaining: i32,
}

impl QuotaStatus {
    /// Derive a status from limits and current usage.
    pub fn from_usage(limits: QuotaLimits, daily_used: i32, monthly_used: i32) -> Self {
        let daily_remaining = (limits.daily - daily_used).max(0);
        let monthly_remaining = (limits.monthly - monthly_used).max(0);
        Self {
            can_proceed: daily_remaining > 0 && monthly_remaining > 0,
            daily_remaining,
            monthly_remaining,
        }
    }
}

/// Daily and monthly job allowances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub daily: i32,
    pub monthly: i32,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            daily: DEFAULT_DAILY_LIMIT,
            monthly: DEFAULT_MONTHLY_LIMIT,
        }
    }
}
