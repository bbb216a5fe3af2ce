//! 가격 계산기
//!
//! 기본 가격에 개인 할인과 연장 할인을 곱셈으로 중첩 적용합니다.
//! 할인율을 더하지 않으므로 합성 할인이 100%를 넘을 수 없습니다.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::billing::model::round_money;

/// 가격 견적
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    #[serde(with = "rust_decimal::serde::float")]
    pub base_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub personal_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub renewal_discount: Decimal,
    /// 표시용 합성 할인율
    #[serde(with = "rust_decimal::serde::float")]
    pub total_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub final_price: Decimal,
    pub is_renewal: bool,
}

/// 가격 계산기
#[derive(Debug, Clone)]
pub struct PricingCalculator {
    /// 연장 시 추가로 적용되는 할인율 (%)
    renewal_discount: Decimal,
}

impl PricingCalculator {
    pub fn new(renewal_discount: Decimal) -> Self {
        Self {
            renewal_discount: clamp_percent(renewal_discount),
        }
    }

    /// 최종 가격만 계산
    pub fn price_for(&self, base_price: Decimal, discount_percentage: Decimal, is_renewal: bool) -> Decimal {
        self.quote(base_price, discount_percentage, is_renewal).final_price
    }

    /// 견적 계산
    pub fn quote(&self, base_price: Decimal, discount_percentage: Decimal, is_renewal: bool) -> PriceQuote {
        let personal = clamp_percent(discount_percentage);
        let renewal = if is_renewal {
            self.renewal_discount
        } else {
            Decimal::ZERO
        };

        let multiplier = remaining_fraction(personal) * remaining_fraction(renewal);
        let final_price = round_money(base_price * multiplier).max(Decimal::ZERO);
        let total_discount = ((Decimal::ONE - multiplier) * Decimal::ONE_HUNDRED).round_dp(2);

        PriceQuote {
            base_price,
            personal_discount: personal,
            renewal_discount: renewal,
            total_discount,
            final_price,
            is_renewal,
        }
    }
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}

fn clamp_percent(percent: Decimal) -> Decimal {
    percent.max(Decimal::ZERO).min(Decimal::ONE_HUNDRED)
}

fn remaining_fraction(percent: Decimal) -> Decimal {
    Decimal::ONE - percent / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_basic_discount() {
        let calc = PricingCalculator::default();
        assert_eq!(calc.price_for(dec!(100), dec!(10), false), dec!(90.00));
        assert_eq!(calc.price_for(dec!(0), dec!(50), false), dec!(0.00));
        assert_eq!(calc.price_for(dec!(25), dec!(0), false), dec!(25.00));
    }

    #[test]
    fn test_half_up_rounding() {
        let calc = PricingCalculator::default();
        // 10.05 * 0.5 = 5.025 → 5.03
        assert_eq!(calc.price_for(dec!(10.05), dec!(50), false), dec!(5.03));
        // 33.33 * 0.85 = 28.3305 → 28.33
        assert_eq!(calc.price_for(dec!(33.33), dec!(15), false), dec!(28.33));
    }

    #[test]
    fn test_renewal_discount_is_multiplicative() {
        let calc = PricingCalculator::new(dec!(30));
        let quote = calc.quote(dec!(100), dec!(20), true);
        // 100 * 0.8 * 0.7 = 56
        assert_eq!(quote.final_price, dec!(56.00));
        assert_eq!(quote.total_discount, dec!(44.00));

        let not_renewal = calc.quote(dec!(100), dec!(20), false);
        assert_eq!(not_renewal.final_price, dec!(80.00));
        assert_eq!(not_renewal.renewal_discount, Decimal::ZERO);
    }

    #[test]
    fn test_never_negative() {
        let calc = PricingCalculator::new(dec!(90));
        assert_eq!(calc.price_for(dec!(100), dec!(100), true), Decimal::ZERO);
        assert_eq!(calc.price_for(dec!(100), dec!(250), false), Decimal::ZERO);
        assert_eq!(calc.price_for(dec!(-5), dec!(0), false), Decimal::ZERO);

        let quote = calc.quote(dec!(100), dec!(90), true);
        assert!(quote.total_discount <= Decimal::ONE_HUNDRED);
    }
}
