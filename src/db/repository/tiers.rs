use sqlx::sqlite::SqlitePool;
use sqlx::{Executor, Sqlite};

use crate::billing::discount::{DiscountTier, TierSchedule};
use crate::billing::error::BillingError;
use crate::billing::model::{percent_to_bps, to_cents};
use crate::db::models::DiscountTierRecord;

/// 등급 수
pub async fn count<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM discount_tiers")
        .fetch_one(executor)
        .await
}

/// 등급표 로드 (`min_spent` 오름차순)
pub async fn load_schedule<'e, E>(executor: E) -> Result<TierSchedule, BillingError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let records = sqlx::query_as::<_, DiscountTierRecord>(
        "SELECT name, min_spent, discount_percentage FROM discount_tiers ORDER BY min_spent ASC"
    )
    .fetch_all(executor)
    .await?;

    TierSchedule::new(records.into_iter().map(DiscountTier::from).collect())
}

/// 등급표 전체 교체
pub async fn replace_all(pool: &SqlitePool, schedule: &TierSchedule) -> Result<(), BillingError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM discount_tiers").execute(&mut *tx).await?;

    for tier in schedule.tiers() {
        sqlx::query(
            "INSERT INTO discount_tiers (name, min_spent, discount_percentage) VALUES (?, ?, ?)"
        )
        .bind(&tier.name)
        .bind(to_cents(tier.min_spent)?)
        .bind(percent_to_bps(tier.discount_percentage)?)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}
