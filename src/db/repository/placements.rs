use sqlx::{Executor, Sqlite};

use crate::db::models::PlacementRecord;

/// 게재 생성
pub async fn insert<'e, E>(executor: E, p: &PlacementRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO placements
         (id, user_id, project_id, site_id, content_id, placement_type, status, base_price, discount_applied,
          final_price, renewal_price, purchased_at, scheduled_publish_date, published_at, expires_at,
          auto_renewal, renewal_count, last_renewed_at, publish_claim, publish_claimed_at, failure_reason,
          version, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&p.id)
    .bind(&p.user_id)
    .bind(&p.project_id)
    .bind(&p.site_id)
    .bind(&p.content_id)
    .bind(&p.placement_type)
    .bind(&p.status)
    .bind(p.base_price)
    .bind(p.discount_applied)
    .bind(p.final_price)
    .bind(p.renewal_price)
    .bind(p.purchased_at)
    .bind(p.scheduled_publish_date)
    .bind(p.published_at)
    .bind(p.expires_at)
    .bind(p.auto_renewal)
    .bind(p.renewal_count)
    .bind(p.last_renewed_at)
    .bind(&p.publish_claim)
    .bind(p.publish_claimed_at)
    .bind(&p.failure_reason)
    .bind(p.version)
    .bind(p.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 게재 조회
pub async fn find<'e, E>(executor: E, placement_id: &str) -> Result<Option<PlacementRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>("SELECT * FROM placements WHERE id = ?")
        .bind(placement_id)
        .fetch_optional(executor)
        .await
}

/// 게재 행 잠금 후 현재 값 반환
///
/// 같은 게재에 대한 상태 전환(주기 스윕 / 사용자 요청)은 이 지점에서 직렬화됩니다.
pub async fn lock<'e, E>(executor: E, placement_id: &str) -> Result<Option<PlacementRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "UPDATE placements SET version = version + 1 WHERE id = ? RETURNING *"
    )
    .bind(placement_id)
    .fetch_optional(executor)
    .await
}

/// 사용자별 게재 목록 (상태 필터 선택)
pub async fn find_by_user<'e, E>(
    executor: E,
    user_id: &str,
    status: Option<&str>,
) -> Result<Vec<PlacementRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "SELECT * FROM placements
         WHERE user_id = ? AND (? IS NULL OR status = ?)
         ORDER BY purchased_at DESC, rowid DESC"
    )
    .bind(user_id)
    .bind(status)
    .bind(status)
    .fetch_all(executor)
    .await
}

/// 같은 콘텐츠가 같은 사이트에 살아있는 게재를 가지고 있는지
pub async fn has_live_placement<'e, E>(executor: E, content_id: &str, site_id: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM placements
         WHERE content_id = ? AND site_id = ? AND status IN ('scheduled', 'placed')"
    )
    .bind(content_id)
    .bind(site_id)
    .fetch_one(executor)
    .await?;

    Ok(count > 0)
}

/// 게재 작업 선점 (예약 상태이고 유효한 선점이 없을 때만 성공)
pub async fn claim_for_publish<'e, E>(
    executor: E,
    placement_id: &str,
    token: &str,
    now: i64,
    stale_before: i64,
) -> Result<Option<PlacementRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "UPDATE placements
         SET publish_claim = ?, publish_claimed_at = ?, version = version + 1, updated_at = ?
         WHERE id = ?
           AND status = 'scheduled'
           AND (publish_claim IS NULL OR publish_claimed_at < ?)
         RETURNING *"
    )
    .bind(token)
    .bind(now)
    .bind(now)
    .bind(placement_id)
    .bind(stale_before)
    .fetch_optional(executor)
    .await
}

/// 게재 완료 (선점 토큰이 일치할 때만)
pub async fn complete_publish<'e, E>(
    executor: E,
    placement_id: &str,
    token: &str,
    published_at: i64,
    expires_at: Option<i64>,
) -> Result<Option<PlacementRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "UPDATE placements
         SET status = 'placed', published_at = ?, expires_at = ?,
             publish_claim = NULL, publish_claimed_at = NULL,
             version = version + 1, updated_at = ?
         WHERE id = ? AND status = 'scheduled' AND publish_claim = ?
         RETURNING *"
    )
    .bind(published_at)
    .bind(expires_at)
    .bind(published_at)
    .bind(placement_id)
    .bind(token)
    .fetch_optional(executor)
    .await
}

/// 게재 실패 (선점 토큰이 일치할 때만)
pub async fn fail_publish<'e, E>(
    executor: E,
    placement_id: &str,
    token: &str,
    reason: &str,
    now: i64,
) -> Result<Option<PlacementRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "UPDATE placements
         SET status = 'failed', failure_reason = ?,
             publish_claim = NULL, publish_claimed_at = NULL,
             version = version + 1, updated_at = ?
         WHERE id = ? AND status = 'scheduled' AND publish_claim = ?
         RETURNING *"
    )
    .bind(reason)
    .bind(now)
    .bind(placement_id)
    .bind(token)
    .fetch_optional(executor)
    .await
}

/// 연장 기록
pub async fn record_renewal<'e, E>(
    executor: E,
    placement_id: &str,
    expires_at: i64,
    renewal_price: i64,
    now: i64,
) -> Result<PlacementRecord, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "UPDATE placements
         SET expires_at = ?, renewal_price = ?, renewal_count = renewal_count + 1,
             last_renewed_at = ?, updated_at = ?
         WHERE id = ?
         RETURNING *"
    )
    .bind(expires_at)
    .bind(renewal_price)
    .bind(now)
    .bind(now)
    .bind(placement_id)
    .fetch_one(executor)
    .await
}

/// 종료 상태로 전환
pub async fn set_terminal<'e, E>(
    executor: E,
    placement_id: &str,
    status: &str,
    reason: Option<&str>,
    now: i64,
) -> Result<PlacementRecord, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "UPDATE placements
         SET status = ?, failure_reason = COALESCE(?, failure_reason),
             auto_renewal = 0, publish_claim = NULL, publish_claimed_at = NULL, updated_at = ?
         WHERE id = ?
         RETURNING *"
    )
    .bind(status)
    .bind(reason)
    .bind(now)
    .bind(placement_id)
    .fetch_one(executor)
    .await
}

/// 자동 연장 설정
pub async fn set_auto_renewal<'e, E>(
    executor: E,
    placement_id: &str,
    enabled: bool,
    now: i64,
) -> Result<PlacementRecord, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PlacementRecord>(
        "UPDATE placements SET auto_renewal = ?, updated_at = ? WHERE id = ? RETURNING *"
    )
    .bind(enabled)
    .bind(now)
    .bind(placement_id)
    .fetch_one(executor)
    .await
}

/// 게재 시각이 도래한 예약 게재 ID
pub async fn due_for_publish_ids<'e, E>(
    executor: E,
    now: i64,
    stale_before: i64,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM placements
         WHERE status = 'scheduled'
           AND (scheduled_publish_date IS NULL OR scheduled_publish_date <= ?)
           AND (publish_claim IS NULL OR publish_claimed_at < ?)
         ORDER BY COALESCE(scheduled_publish_date, purchased_at) ASC
         LIMIT ?"
    )
    .bind(now)
    .bind(stale_before)
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// 자동 연장 대상 (만료 시각이 `horizon` 이전인 자동 연장 링크)
pub async fn auto_renewal_candidate_ids<'e, E>(executor: E, horizon: i64, limit: i64) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM placements
         WHERE status = 'placed'
           AND auto_renewal = 1
           AND placement_type = 'link'
           AND expires_at IS NOT NULL
           AND expires_at <= ?
         ORDER BY expires_at ASC
         LIMIT ?"
    )
    .bind(horizon)
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// 만료 시각이 지난 게재 ID
pub async fn expired_ids<'e, E>(executor: E, now: i64, limit: i64) -> Result<Vec<String>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, String>(
        "SELECT id FROM placements
         WHERE status = 'placed' AND expires_at IS NOT NULL AND expires_at <= ?
         ORDER BY expires_at ASC
         LIMIT ?"
    )
    .bind(now)
    .bind(limit)
    .fetch_all(executor)
    .await
}
