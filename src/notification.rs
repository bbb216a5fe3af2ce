//! 알림
//!
//! 보너스 해제, 게재 완료/실패/만료, 자동 연장 등의 이벤트를
//! 상태 변경과 같은 DB 트랜잭션 안에서 기록합니다.
//! 실제 전달(UI, 메일)은 이 테이블을 읽는 외부 구성요소의 몫입니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::billing::error::BillingError;
use crate::db::models::{to_millis, NotificationRecord};
use crate::db::repository::notifications;

/// 알림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BonusUnlocked,
    PlacementPublished,
    PlacementFailed,
    PlacementExpired,
    PlacementAutoRenewed,
    PlacementRejected,
}

impl NotificationKind {
    const ALL: [NotificationKind; 6] = [
        NotificationKind::BonusUnlocked,
        NotificationKind::PlacementPublished,
        NotificationKind::PlacementFailed,
        NotificationKind::PlacementExpired,
        NotificationKind::PlacementAutoRenewed,
        NotificationKind::PlacementRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BonusUnlocked => "bonus_unlocked",
            NotificationKind::PlacementPublished => "placement_published",
            NotificationKind::PlacementFailed => "placement_failed",
            NotificationKind::PlacementExpired => "placement_expired",
            NotificationKind::PlacementAutoRenewed => "placement_auto_renewed",
            NotificationKind::PlacementRejected => "placement_rejected",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| BillingError::Validation(format!("알 수 없는 알림 종류: {}", s)))
    }
}

/// 알림 메시지
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            metadata,
            is_read: false,
            created_at: now,
        }
    }

    /// 게재 관련 알림
    pub fn for_placement(
        user_id: &str,
        placement_id: &str,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(user_id, kind, title, message, json!({ "placementId": placement_id }), now)
    }

    fn to_record(&self) -> NotificationRecord {
        NotificationRecord {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            kind: self.kind.as_str().to_string(),
            title: self.title.clone(),
            message: self.message.clone(),
            metadata: if self.metadata.is_null() {
                None
            } else {
                Some(self.metadata.to_string())
            },
            is_read: self.is_read,
            created_at: to_millis(self.created_at),
        }
    }
}

/// 진행 중인 트랜잭션 안에서 알림 기록
pub async fn emit(conn: &mut SqliteConnection, notification: &Notification) -> Result<(), BillingError> {
    notifications::insert(&mut *conn, &notification.to_record()).await?;
    Ok(())
}

/// 알림 조회 서비스
pub struct NotificationCenter {
    pool: SqlitePool,
}

impl NotificationCenter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 사용자 알림 목록
    pub async fn list(&self, user_id: &str, unread_only: bool, limit: i64) -> Result<Vec<Notification>, BillingError> {
        let records = notifications::find_by_user(&self.pool, user_id, unread_only, limit.clamp(1, 200)).await?;
        records.into_iter().map(Notification::try_from).collect()
    }

    /// 읽음 처리
    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<(), BillingError> {
        if notifications::mark_read(&self.pool, user_id, notification_id).await? == 0 {
            return Err(BillingError::NotFound("알림".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_parse_back() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_placement_notification_metadata() {
        let n = Notification::for_placement(
            "u1",
            "p1",
            NotificationKind::PlacementExpired,
            "만료",
            "게재가 만료되었습니다",
            Utc::now(),
        );
        assert_eq!(n.metadata["placementId"], "p1");
        assert_eq!(n.to_record().metadata.as_deref(), Some("{\"placementId\":\"p1\"}"));
    }
}
