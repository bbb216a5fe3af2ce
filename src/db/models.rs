//! DB 행 모델
//!
//! 금액은 센트 단위 INTEGER, 할인율은 basis point INTEGER,
//! 시각은 epoch 밀리초 INTEGER 로 저장합니다.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::billing::discount::DiscountTier;
use crate::billing::error::BillingError;
use crate::billing::model::{bps_to_percent, from_cents, Account, LedgerEntry};
use crate::catalog::{ContentItem, Project, Site};
use crate::notification::Notification;
use crate::placement::model::Placement;

/// 시각 → epoch 밀리초
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// epoch 밀리초 → 시각
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// 사용자 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub initial_balance: i64,
    pub balance: i64,
    pub total_spent: i64,
    pub current_discount: i64,
    pub locked_bonus: i64,
    pub locked_bonus_unlock_amount: i64,
    pub locked_bonus_unlocked: bool,
    pub version: i64,
    pub created_at: i64,
}

impl From<UserRecord> for Account {
    fn from(r: UserRecord) -> Self {
        Account {
            id: r.id,
            username: r.username,
            referral_code: r.referral_code,
            referred_by: r.referred_by,
            initial_balance: from_cents(r.initial_balance),
            balance: from_cents(r.balance),
            total_spent: from_cents(r.total_spent),
            current_discount: bps_to_percent(r.current_discount),
            locked_bonus: from_cents(r.locked_bonus),
            locked_bonus_unlock_amount: from_cents(r.locked_bonus_unlock_amount),
            locked_bonus_unlocked: r.locked_bonus_unlocked,
            created_at: from_millis(r.created_at),
        }
    }
}

/// 원장 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub transaction_type: String,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub placement_id: Option<String>,
    pub created_at: i64,
}

impl TryFrom<TransactionRecord> for LedgerEntry {
    type Error = BillingError;

    fn try_from(r: TransactionRecord) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            transaction_type: r.transaction_type.parse()?,
            id: r.id,
            user_id: r.user_id,
            amount: from_cents(r.amount),
            balance_before: from_cents(r.balance_before),
            balance_after: from_cents(r.balance_after),
            description: r.description,
            placement_id: r.placement_id,
            created_at: from_millis(r.created_at),
        })
    }
}

/// 할인 등급 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DiscountTierRecord {
    pub name: String,
    pub min_spent: i64,
    pub discount_percentage: i64,
}

impl From<DiscountTierRecord> for DiscountTier {
    fn from(r: DiscountTierRecord) -> Self {
        DiscountTier::new(r.name, from_cents(r.min_spent), bps_to_percent(r.discount_percentage))
    }
}

/// 사이트 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SiteRecord {
    pub id: String,
    pub name: String,
    pub site_url: String,
    pub price_link: i64,
    pub price_article: i64,
    pub max_links: i64,
    pub max_articles: i64,
    pub used_links: i64,
    pub used_articles: i64,
    pub available: bool,
    pub created_at: i64,
}

impl From<SiteRecord> for Site {
    fn from(r: SiteRecord) -> Self {
        Site {
            id: r.id,
            name: r.name,
            site_url: r.site_url,
            price_link: from_cents(r.price_link),
            price_article: from_cents(r.price_article),
            max_links: r.max_links,
            max_articles: r.max_articles,
            used_links: r.used_links,
            used_articles: r.used_articles,
            available: r.available,
            created_at: from_millis(r.created_at),
        }
    }
}

/// 프로젝트 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

impl From<ProjectRecord> for Project {
    fn from(r: ProjectRecord) -> Self {
        Project {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            description: r.description,
            created_at: from_millis(r.created_at),
        }
    }
}

/// 프로젝트 콘텐츠 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentRecord {
    pub id: String,
    pub project_id: String,
    pub content_type: String,
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub created_at: i64,
}

impl TryFrom<ContentRecord> for ContentItem {
    type Error = BillingError;

    fn try_from(r: ContentRecord) -> Result<Self, Self::Error> {
        Ok(ContentItem {
            content_type: r.content_type.parse()?,
            id: r.id,
            project_id: r.project_id,
            title: r.title,
            url: r.url,
            body: r.body,
            created_at: from_millis(r.created_at),
        })
    }
}

/// 게재 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlacementRecord {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub site_id: String,
    pub content_id: String,
    pub placement_type: String,
    pub status: String,
    pub base_price: i64,
    pub discount_applied: i64,
    pub final_price: i64,
    pub renewal_price: i64,
    pub purchased_at: i64,
    pub scheduled_publish_date: Option<i64>,
    pub published_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub auto_renewal: bool,
    pub renewal_count: i64,
    pub last_renewed_at: Option<i64>,
    pub publish_claim: Option<String>,
    pub publish_claimed_at: Option<i64>,
    pub failure_reason: Option<String>,
    pub version: i64,
    pub updated_at: i64,
}

impl TryFrom<PlacementRecord> for Placement {
    type Error = BillingError;

    fn try_from(r: PlacementRecord) -> Result<Self, Self::Error> {
        Ok(Placement {
            placement_type: r.placement_type.parse()?,
            status: r.status.parse()?,
            id: r.id,
            user_id: r.user_id,
            project_id: r.project_id,
            site_id: r.site_id,
            content_id: r.content_id,
            base_price: from_cents(r.base_price),
            discount_applied: bps_to_percent(r.discount_applied),
            final_price: from_cents(r.final_price),
            renewal_price: from_cents(r.renewal_price),
            purchased_at: from_millis(r.purchased_at),
            scheduled_publish_date: r.scheduled_publish_date.map(from_millis),
            published_at: r.published_at.map(from_millis),
            expires_at: r.expires_at.map(from_millis),
            auto_renewal: r.auto_renewal,
            renewal_count: r.renewal_count,
            last_renewed_at: r.last_renewed_at.map(from_millis),
            failure_reason: r.failure_reason,
            updated_at: from_millis(r.updated_at),
        })
    }
}

/// 알림 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub metadata: Option<String>,
    pub is_read: bool,
    pub created_at: i64,
}

impl TryFrom<NotificationRecord> for Notification {
    type Error = BillingError;

    fn try_from(r: NotificationRecord) -> Result<Self, Self::Error> {
        let metadata = match r.metadata {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| BillingError::Validation(format!("알림 메타데이터 파싱 실패: {}", e)))?,
            None => serde_json::Value::Null,
        };

        Ok(Notification {
            kind: r.kind.parse()?,
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            message: r.message,
            metadata,
            is_read: r.is_read,
            created_at: from_millis(r.created_at),
        })
    }
}

/// 프로모션 코드 DB 모델
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoCodeRecord {
    pub code: String,
    pub bonus_percent: i64,
    pub min_deposit: i64,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub active: bool,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_round_trip_keeps_ordering() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(to_millis(earlier) < to_millis(later));
        assert_eq!(from_millis(to_millis(later)), later);
    }

    #[test]
    fn test_placement_record_rejects_unknown_status() {
        let record = PlacementRecord {
            id: "p1".into(),
            user_id: "u1".into(),
            project_id: "pr1".into(),
            site_id: "s1".into(),
            content_id: "c1".into(),
            placement_type: "link".into(),
            status: "archived".into(),
            base_price: 1000,
            discount_applied: 0,
            final_price: 1000,
            renewal_price: 1000,
            purchased_at: 0,
            scheduled_publish_date: None,
            published_at: None,
            expires_at: None,
            auto_renewal: false,
            renewal_count: 0,
            last_renewed_at: None,
            publish_claim: None,
            publish_claimed_at: None,
            failure_reason: None,
            version: 0,
            updated_at: 0,
        };
        assert!(Placement::try_from(record).is_err());
    }
}
