use sqlx::{Executor, Sqlite};

use crate::db::models::UserRecord;

/// 사용자 생성
pub async fn insert<'e, E>(executor: E, user: &UserRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO users
         (id, username, referral_code, referred_by, initial_balance, balance, total_spent, current_discount,
          locked_bonus, locked_bonus_unlock_amount, locked_bonus_unlocked, version, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.referral_code)
    .bind(&user.referred_by)
    .bind(user.initial_balance)
    .bind(user.balance)
    .bind(user.total_spent)
    .bind(user.current_discount)
    .bind(user.locked_bonus)
    .bind(user.locked_bonus_unlock_amount)
    .bind(user.locked_bonus_unlocked)
    .bind(user.version)
    .bind(user.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 사용자 조회
pub async fn find<'e, E>(executor: E, user_id: &str) -> Result<Option<UserRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// 추천 코드로 사용자 조회
pub async fn find_by_referral_code<'e, E>(executor: E, code: &str) -> Result<Option<UserRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE referral_code = ?")
        .bind(code)
        .fetch_optional(executor)
        .await
}

/// 사용자 행 잠금 후 현재 값 반환
///
/// 트랜잭션의 첫 문장이 쓰기이므로 읽기보다 먼저 쓰기 잠금을 확보합니다.
/// 같은 사용자에 대한 원장 변경은 이 지점에서 직렬화됩니다.
pub async fn lock<'e, E>(executor: E, user_id: &str) -> Result<Option<UserRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, UserRecord>(
        "UPDATE users SET version = version + 1 WHERE id = ? RETURNING *"
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// 잔고 / 누적 지출 / 현재 할인율 갱신
pub async fn update_balance<'e, E>(
    executor: E,
    user_id: &str,
    balance: i64,
    total_spent: i64,
    current_discount: i64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE users
         SET balance = ?, total_spent = ?, current_discount = ?
         WHERE id = ?"
    )
    .bind(balance)
    .bind(total_spent)
    .bind(current_discount)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// 잠금 보너스 설정 (이미 해제된 사용자는 변경하지 않음)
pub async fn set_locked_bonus<'e, E>(
    executor: E,
    user_id: &str,
    bonus: i64,
    unlock_amount: i64,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE users
         SET locked_bonus = ?, locked_bonus_unlock_amount = ?
         WHERE id = ? AND locked_bonus_unlocked = 0"
    )
    .bind(bonus)
    .bind(unlock_amount)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// 잠금 보너스 해제 표시 (최초 1회만 반영됨)
pub async fn mark_bonus_unlocked<'e, E>(executor: E, user_id: &str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE users
         SET locked_bonus = 0, locked_bonus_unlocked = 1
         WHERE id = ? AND locked_bonus_unlocked = 0"
    )
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
