//! Repository for per-owner quota counters (`user_quotas`).

use genflow_core::quota::QuotaStatus;
use genflow_core::types::DbId;
use sqlx::PgPool;

/// Wraps the `check_user_quota` / `increment_user_quota` procedures.
pub struct QuotaRepo;

impl QuotaRepo {
    /// Read remaining allowances, rolling counters over a period boundary first.
    pub async fn check(pool: &PgPool, owner_id: DbId) -> Result<QuotaStatus, sqlx::Error> {
        let (can_proceed, daily_remaining, monthly_remaining) =
            sqlx::query_as::<_, (bool, i32, i32)>(
                "SELECT can_proceed, daily_remaining, monthly_remaining \
                 FROM check_user_quota($1)",
            )
            .bind(owner_id)
            .fetch_one(pool)
            .await?;

        Ok(QuotaStatus {
            can_proceed,
            daily_remaining,
            monthly_remaining,
        })
    }

    /// Count one created job against the owner's daily and monthly quota.
    pub async fn increment(pool: &PgPool, owner_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT increment_user_quota($1)")
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
