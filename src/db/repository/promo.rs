use sqlx::{Executor, Sqlite};

use crate::db::models::PromoCodeRecord;

/// 프로모션 코드 등록
pub async fn insert<'e, E>(executor: E, promo: &PromoCodeRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO promo_codes (code, bonus_percent, min_deposit, max_uses, used_count, active, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&promo.code)
    .bind(promo.bonus_percent)
    .bind(promo.min_deposit)
    .bind(promo.max_uses)
    .bind(promo.used_count)
    .bind(promo.active)
    .bind(promo.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 프로모션 코드 조회
pub async fn find<'e, E>(executor: E, code: &str) -> Result<Option<PromoCodeRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PromoCodeRecord>("SELECT * FROM promo_codes WHERE code = ?")
        .bind(code)
        .fetch_optional(executor)
        .await
}

/// 사용 횟수를 소모하며 코드 사용 (조건 불충족 시 `None`)
pub async fn redeem<'e, E>(executor: E, code: &str, deposit: i64) -> Result<Option<PromoCodeRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PromoCodeRecord>(
        "UPDATE promo_codes
         SET used_count = used_count + 1
         WHERE code = ?
           AND active = 1
           AND min_deposit <= ?
           AND (max_uses IS NULL OR used_count < max_uses)
         RETURNING *"
    )
    .bind(code)
    .bind(deposit)
    .fetch_optional(executor)
    .await
}
