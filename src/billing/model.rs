//! 결제 원장의 기본 모델
//!
//! 거래 종류, 원장 항목, 사용자 계정, 잔고 요약 등
//! 원장 엔진의 핵심 데이터 모델과 금액 변환 규칙을 정의합니다.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::billing::error::BillingError;

/// 거래 종류 (닫힌 열거형)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// 입금
    Deposit,
    /// 게재 구매
    Purchase,
    /// 수동 연장
    Renewal,
    /// 자동 연장
    AutoRenewal,
    /// 환불
    Refund,
    /// 관리자 조정
    AdminAdjustment,
    /// 추천 보너스
    Referral,
}

impl TransactionType {
    pub const ALL: [TransactionType; 7] = [
        TransactionType::Deposit,
        TransactionType::Purchase,
        TransactionType::Renewal,
        TransactionType::AutoRenewal,
        TransactionType::Refund,
        TransactionType::AdminAdjustment,
        TransactionType::Referral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Purchase => "purchase",
            TransactionType::Renewal => "renewal",
            TransactionType::AutoRenewal => "auto_renewal",
            TransactionType::Refund => "refund",
            TransactionType::AdminAdjustment => "admin_adjustment",
            TransactionType::Referral => "referral",
        }
    }

    /// 누적 지출(`total_spent`)에 반영되는 지출성 거래인지
    pub fn is_spend(&self) -> bool {
        matches!(
            self,
            TransactionType::Purchase | TransactionType::Renewal | TransactionType::AutoRenewal
        )
    }

    /// 금액 부호 규칙: 지출은 음수, 입금/환불/보너스는 양수, 관리자 조정은 양쪽 모두 허용
    pub fn accepts_sign(&self, amount: Decimal) -> bool {
        match self {
            TransactionType::Purchase | TransactionType::Renewal | TransactionType::AutoRenewal => {
                amount.is_sign_negative()
            }
            TransactionType::Deposit | TransactionType::Refund | TransactionType::Referral => {
                amount.is_sign_positive()
            }
            TransactionType::AdminAdjustment => true,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| BillingError::Validation(format!("알 수 없는 거래 종류: {}", s)))
    }
}

/// 원장 항목 (불변)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_before: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_after: Decimal,
    pub description: String,
    pub placement_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 사용자 계정
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub username: String,
    pub referral_code: String,
    pub referred_by: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub initial_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub locked_bonus: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub locked_bonus_unlock_amount: Decimal,
    pub locked_bonus_unlocked: bool,
    pub created_at: DateTime<Utc>,
}

/// 잔고 조회 응답 (`GET balance`)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_discount: Decimal,
    pub discount_tier: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub locked_bonus: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unlock_amount: Decimal,
    pub next_tier: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub progress_to_next_tier: Decimal,
}

/// 원장 정합성 점검 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub user_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub initial_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub transaction_sum: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub consistent: bool,
}

const CENTS: i64 = 100;

/// 금액을 소수점 둘째 자리로 반올림 (half-up)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// 금액 → 최소 단위(센트) 정수
pub fn to_cents(amount: Decimal) -> Result<i64, BillingError> {
    round_money(amount)
        .checked_mul(Decimal::from(CENTS))
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| BillingError::InvalidAmount(format!("표현할 수 없는 금액: {}", amount)))
}

/// 최소 단위(센트) 정수 → 금액
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// 퍼센트 → basis point 정수 (10.5% → 1050)
pub fn percent_to_bps(percent: Decimal) -> Result<i64, BillingError> {
    to_cents(percent)
}

/// basis point 정수 → 퍼센트
pub fn bps_to_percent(bps: i64) -> Decimal {
    from_cents(bps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transaction_type_round_trip_names() {
        for kind in TransactionType::ALL {
            let parsed: TransactionType = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("bonus".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_spend_types() {
        assert!(TransactionType::Purchase.is_spend());
        assert!(TransactionType::AutoRenewal.is_spend());
        assert!(!TransactionType::Referral.is_spend());
        assert!(!TransactionType::Deposit.is_spend());
        assert!(!TransactionType::Refund.is_spend());
    }

    #[test]
    fn test_sign_rules() {
        assert!(TransactionType::Purchase.accepts_sign(dec!(-10)));
        assert!(!TransactionType::Purchase.accepts_sign(dec!(10)));
        assert!(!TransactionType::Deposit.accepts_sign(dec!(-10)));
        assert!(TransactionType::AdminAdjustment.accepts_sign(dec!(-10)));
    }

    #[test]
    fn test_money_rounding_half_up() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
        assert_eq!(to_cents(dec!(25.00)).unwrap(), 2500);
        assert_eq!(from_cents(2599), dec!(25.99));
        assert_eq!(percent_to_bps(dec!(12.5)).unwrap(), 1250);
        assert_eq!(bps_to_percent(1500), dec!(15));
    }

    #[test]
    fn test_unrepresentable_amounts_are_rejected() {
        assert!(matches!(to_cents(Decimal::MAX), Err(BillingError::InvalidAmount(_))));
        assert!(matches!(
            to_cents(dec!(100000000000000000000)),
            Err(BillingError::InvalidAmount(_))
        ));
        assert!(to_cents(dec!(92233720368547758.07)).is_ok());
    }
}
