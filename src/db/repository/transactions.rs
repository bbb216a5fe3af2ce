use sqlx::{Executor, Sqlite};

use crate::db::models::TransactionRecord;

/// 원장 행 추가 (수정/삭제 함수는 의도적으로 두지 않음)
pub async fn insert<'e, E>(executor: E, record: &TransactionRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO transactions
         (id, user_id, transaction_type, amount, balance_before, balance_after, description, placement_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(&record.transaction_type)
    .bind(record.amount)
    .bind(record.balance_before)
    .bind(record.balance_after)
    .bind(&record.description)
    .bind(&record.placement_id)
    .bind(record.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 사용자별 거래 내역 (최신순)
pub async fn find_by_user<'e, E>(
    executor: E,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<TransactionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, TransactionRecord>(
        "SELECT id, user_id, transaction_type, amount, balance_before, balance_after, description, placement_id, created_at
         FROM transactions
         WHERE user_id = ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT ? OFFSET ?"
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

/// 게재에 연결된 거래 내역 (시간순)
pub async fn find_by_placement<'e, E>(executor: E, placement_id: &str) -> Result<Vec<TransactionRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, TransactionRecord>(
        "SELECT id, user_id, transaction_type, amount, balance_before, balance_after, description, placement_id, created_at
         FROM transactions
         WHERE placement_id = ?
         ORDER BY created_at ASC, rowid ASC"
    )
    .bind(placement_id)
    .fetch_all(executor)
    .await
}

/// 사용자 거래 금액 합계
pub async fn sum_for_user<'e, E>(executor: E, user_id: &str) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(executor)
        .await
}
