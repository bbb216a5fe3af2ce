//! 누적 지출 기반 할인 등급 엔진
//!
//! 등급 목록은 관리자가 구성하는 읽기 전용 데이터이며,
//! 이 모듈의 계산은 모두 순수 함수입니다.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::billing::error::BillingError;

/// 기본(할인 없음) 등급 이름
pub const STANDARD_TIER: &str = "Standard";

/// 할인 등급
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountTier {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_spent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percentage: Decimal,
}

impl DiscountTier {
    pub fn new(name: impl Into<String>, min_spent: Decimal, discount_percentage: Decimal) -> Self {
        Self {
            name: name.into(),
            min_spent,
            discount_percentage,
        }
    }

    fn standard() -> Self {
        Self::new(STANDARD_TIER, Decimal::ZERO, Decimal::ZERO)
    }
}

/// 최초 기동 시 기본으로 채워 넣는 등급 목록
pub fn default_tiers() -> Vec<DiscountTier> {
    vec![
        DiscountTier::new(STANDARD_TIER, Decimal::ZERO, Decimal::ZERO),
        DiscountTier::new("Bronze", Decimal::from(800), Decimal::from(10)),
        DiscountTier::new("Silver", Decimal::from(1200), Decimal::from(15)),
        DiscountTier::new("Gold", Decimal::from(1600), Decimal::from(20)),
        DiscountTier::new("Platinum", Decimal::from(2000), Decimal::from(25)),
        DiscountTier::new("Diamond", Decimal::from(2400), Decimal::from(30)),
    ]
}

/// `min_spent` 오름차순으로 정렬된 등급표
///
/// 0 기준 등급이 없으면 할인 0%의 `Standard` 등급을 암묵적으로 추가합니다.
#[derive(Debug, Clone)]
pub struct TierSchedule {
    tiers: Vec<DiscountTier>,
}

impl TierSchedule {
    pub fn new(mut tiers: Vec<DiscountTier>) -> Result<Self, BillingError> {
        for tier in &tiers {
            if tier.min_spent.is_sign_negative() {
                return Err(BillingError::Validation(format!(
                    "등급 {} 의 기준 금액이 음수입니다",
                    tier.name
                )));
            }
            if tier.discount_percentage < Decimal::ZERO || tier.discount_percentage > Decimal::ONE_HUNDRED {
                return Err(BillingError::Validation(format!(
                    "등급 {} 의 할인율은 0~100 사이여야 합니다",
                    tier.name
                )));
            }
        }

        tiers.sort_by(|a, b| a.min_spent.cmp(&b.min_spent));

        // 기준 금액이 커질수록 할인율이 줄어들면 단조성이 깨짐
        for pair in tiers.windows(2) {
            if pair[0].min_spent == pair[1].min_spent {
                return Err(BillingError::Validation(format!(
                    "중복된 등급 기준 금액: {}",
                    pair[1].min_spent
                )));
            }
            if pair[1].discount_percentage < pair[0].discount_percentage {
                return Err(BillingError::Validation(format!(
                    "등급 {} 의 할인율이 하위 등급 {} 보다 낮습니다",
                    pair[1].name, pair[0].name
                )));
            }
        }

        if tiers.first().map_or(true, |t| t.min_spent > Decimal::ZERO) {
            tiers.insert(0, DiscountTier::standard());
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[DiscountTier] {
        &self.tiers
    }

    /// 누적 지출에 해당하는 등급 (`min_spent <= total_spent` 중 최대)
    pub fn tier_for(&self, total_spent: Decimal) -> &DiscountTier {
        let idx = self.current_index(total_spent);
        &self.tiers[idx]
    }

    /// 다음 등급 (최상위 등급이면 `None`)
    pub fn next_tier(&self, total_spent: Decimal) -> Option<&DiscountTier> {
        self.tiers.get(self.current_index(total_spent) + 1)
    }

    /// 다음 등급까지의 진행률 [0, 100]
    pub fn progress_to_next_tier(&self, total_spent: Decimal) -> Decimal {
        let current = self.tier_for(total_spent);
        let Some(next) = self.next_tier(total_spent) else {
            return Decimal::ONE_HUNDRED;
        };

        let span = next.min_spent - current.min_spent;
        if span <= Decimal::ZERO {
            return Decimal::ONE_HUNDRED;
        }

        let progress = (total_spent.max(Decimal::ZERO) - current.min_spent) / span * Decimal::ONE_HUNDRED;
        progress
            .max(Decimal::ZERO)
            .min(Decimal::ONE_HUNDRED)
            .round_dp(2)
    }

    fn current_index(&self, total_spent: Decimal) -> usize {
        // tiers[0].min_spent == 0 이 항상 보장됨
        self.tiers
            .iter()
            .rposition(|t| t.min_spent <= total_spent)
            .unwrap_or(0)
    }
}

impl Default for TierSchedule {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}
