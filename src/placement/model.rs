//! 게재 모델
//!
//! 게재 종류, 상태 머신, 요청 주체 등 게재 수명주기의 기본 타입을 정의합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::error::BillingError;

/// 게재 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementType {
    Link,
    Article,
}

impl PlacementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementType::Link => "link",
            PlacementType::Article => "article",
        }
    }
}

impl fmt::Display for PlacementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "link" => Ok(PlacementType::Link),
            "article" => Ok(PlacementType::Article),
            other => Err(BillingError::Validation(format!("알 수 없는 게재 종류: {}", other))),
        }
    }
}

/// 게재 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementStatus {
    /// 게재 예약됨
    Scheduled,
    /// 게재됨
    Placed,
    /// 만료됨
    Expired,
    /// 취소됨 (환불)
    Cancelled,
    /// 검수 거절 (환불)
    Rejected,
    /// 게재 실패
    Failed,
}

impl PlacementStatus {
    pub const ALL: [PlacementStatus; 6] = [
        PlacementStatus::Scheduled,
        PlacementStatus::Placed,
        PlacementStatus::Expired,
        PlacementStatus::Cancelled,
        PlacementStatus::Rejected,
        PlacementStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementStatus::Scheduled => "scheduled",
            PlacementStatus::Placed => "placed",
            PlacementStatus::Expired => "expired",
            PlacementStatus::Cancelled => "cancelled",
            PlacementStatus::Rejected => "rejected",
            PlacementStatus::Failed => "failed",
        }
    }

    /// 종료 상태 여부 (이후 어떤 전환도 없음)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PlacementStatus::Scheduled | PlacementStatus::Placed)
    }

    /// 허용된 전환인지 (`placed → placed` 는 연장)
    pub fn can_transition_to(&self, next: PlacementStatus) -> bool {
        use PlacementStatus::*;
        matches!(
            (self, next),
            (Scheduled, Placed)
                | (Scheduled, Failed)
                | (Scheduled, Cancelled)
                | (Scheduled, Rejected)
                | (Placed, Placed)
                | (Placed, Expired)
                | (Placed, Cancelled)
        )
    }

    /// 전환 검사
    pub fn ensure_transition(&self, next: PlacementStatus) -> Result<(), BillingError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(BillingError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for PlacementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlacementStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BillingError::Validation(format!("알 수 없는 게재 상태: {}", s)))
    }
}

/// 게재
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub site_id: String,
    pub content_id: String,
    #[serde(rename = "type")]
    pub placement_type: PlacementType,
    pub status: PlacementStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_applied: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub renewal_price: Decimal,
    pub purchased_at: DateTime<Utc>,
    pub scheduled_publish_date: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    /// `None` 이면 무기한
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renewal: bool,
    pub renewal_count: i64,
    pub last_renewed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Placement {
    /// 만료 시각이 지났는지
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }

    /// 연장 가능한 게재인지 (만료 기한이 있는 링크)
    pub fn is_renewable(&self) -> bool {
        self.placement_type == PlacementType::Link && self.expires_at.is_some()
    }
}

/// 요청 주체
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// 게재 소유자 본인
    User(String),
    /// 관리자
    Admin(String),
    /// 주기 스윕 등 내부 처리
    System,
}

impl Actor {
    /// 게재 소유자에 대한 권한 확인
    pub fn authorize(&self, owner_id: &str) -> Result<(), BillingError> {
        match self {
            Actor::User(id) if id == owner_id => Ok(()),
            Actor::User(_) => Err(BillingError::Forbidden),
            Actor::Admin(_) | Actor::System => Ok(()),
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Actor::Admin(_) | Actor::System)
    }
}

/// 연장 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalKind {
    Manual,
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_exit() {
        for from in PlacementStatus::ALL.iter().filter(|s| s.is_terminal()) {
            for to in PlacementStatus::ALL {
                assert!(!from.can_transition_to(to), "{} -> {} 허용됨", from, to);
            }
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        use PlacementStatus::*;
        assert!(Scheduled.can_transition_to(Placed));
        assert!(Scheduled.can_transition_to(Failed));
        assert!(Scheduled.can_transition_to(Rejected));
        assert!(Placed.can_transition_to(Expired));
        assert!(Placed.can_transition_to(Placed));
        assert!(!Placed.can_transition_to(Rejected));
        assert!(!Scheduled.can_transition_to(Expired));
        assert!(matches!(
            Expired.ensure_transition(Cancelled),
            Err(BillingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_status_parsing() {
        for status in PlacementStatus::ALL {
            assert_eq!(status.as_str().parse::<PlacementStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<PlacementStatus>().is_err());
        assert_eq!("article".parse::<PlacementType>().unwrap(), PlacementType::Article);
    }

    #[test]
    fn test_actor_authorization() {
        assert!(Actor::User("u1".into()).authorize("u1").is_ok());
        assert!(matches!(Actor::User("u2".into()).authorize("u1"), Err(BillingError::Forbidden)));
        assert!(Actor::Admin("ops".into()).authorize("u1").is_ok());
        assert!(Actor::System.authorize("u1").is_ok());
    }
}
