use sqlx::{Executor, Sqlite};

use crate::db::models::NotificationRecord;

/// 알림 저장
pub async fn insert<'e, E>(executor: E, record: &NotificationRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO notifications (id, user_id, kind, title, message, metadata, is_read, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(&record.kind)
    .bind(&record.title)
    .bind(&record.message)
    .bind(&record.metadata)
    .bind(record.is_read)
    .bind(record.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 사용자별 알림 (최신순)
pub async fn find_by_user<'e, E>(
    executor: E,
    user_id: &str,
    unread_only: bool,
    limit: i64,
) -> Result<Vec<NotificationRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, NotificationRecord>(
        "SELECT * FROM notifications
         WHERE user_id = ? AND (? = 0 OR is_read = 0)
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?"
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// 읽음 처리
pub async fn mark_read<'e, E>(executor: E, user_id: &str, notification_id: &str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
        .bind(notification_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
