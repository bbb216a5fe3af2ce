//! 결제 서비스
//!
//! 가입, 입금(프로모션/추천 보너스 포함), 잔고 요약, 할인 등급과 가격 견적을 제공합니다.

use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::billing::discount::{DiscountTier, TierSchedule};
use crate::billing::error::BillingError;
use crate::billing::ledger::{apply_in_tx, LedgerReceipt, LedgerRequest, LedgerStore};
use crate::billing::model::{
    bps_to_percent, from_cents, round_money, to_cents, percent_to_bps, Account, BalanceSummary, TransactionType,
};
use crate::billing::pricing::{PriceQuote, PricingCalculator};
use crate::billing::referral::{unlock_in_tx, ReferralBonusUnlocker};
use crate::config::BillingSettings;
use crate::db::models::{to_millis, PromoCodeRecord, UserRecord};
use crate::db::repository::{promo, tiers, users};

/// 입금 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub transaction_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
    /// 프로모션 코드 보너스
    #[serde(with = "rust_decimal::serde::float_option")]
    pub bonus_amount: Option<Decimal>,
    /// 이번 입금으로 해제된 추천 보너스
    #[serde(with = "rust_decimal::serde::float_option")]
    pub referral_bonus: Option<Decimal>,
}

/// 프로모션 코드 등록 요청
#[derive(Debug, Clone)]
pub struct NewPromoCode {
    pub code: String,
    pub bonus_percent: Decimal,
    pub min_deposit: Decimal,
    pub max_uses: Option<i64>,
}

/// 결제 서비스
#[derive(Clone)]
pub struct BillingService {
    pool: SqlitePool,
    ledger: LedgerStore,
    referral: ReferralBonusUnlocker,
    pricing: PricingCalculator,
    settings: BillingSettings,
}

impl BillingService {
    pub fn new(pool: SqlitePool, settings: BillingSettings) -> Self {
        Self {
            ledger: LedgerStore::new(pool.clone()),
            referral: ReferralBonusUnlocker::new(pool.clone()),
            pricing: PricingCalculator::new(settings.renewal_discount),
            pool,
            settings,
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn referral(&self) -> &ReferralBonusUnlocker {
        &self.referral
    }

    pub fn pricing(&self) -> &PricingCalculator {
        &self.pricing
    }

    /// 사용자 가입
    ///
    /// 잔고 0으로 시작합니다. 자금은 입금이나 관리자 조정 원장 기록으로만 들어옵니다.
    /// 다른 사용자의 추천 코드가 주어지면 잠금 보너스를 설정합니다.
    pub async fn register_user(
        &self,
        username: &str,
        referral_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Account, BillingError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BillingError::Validation("사용자 이름이 필요합니다".to_string()));
        }

        let referrer = match referral_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(
                users::find_by_referral_code(&self.pool, &code.to_uppercase())
                    .await?
                    .ok_or_else(|| BillingError::Validation(format!("유효하지 않은 추천 코드: {}", code)))?,
            ),
            None => None,
        };

        let (locked_bonus, unlock_amount) = if referrer.is_some() {
            (
                to_cents(self.settings.referral_locked_bonus)?,
                to_cents(self.settings.referral_unlock_amount)?,
            )
        } else {
            (0, 0)
        };

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            referral_code: generate_referral_code(),
            referred_by: referrer.as_ref().map(|r| r.id.clone()),
            initial_balance: 0,
            balance: 0,
            total_spent: 0,
            current_discount: 0,
            locked_bonus,
            locked_bonus_unlock_amount: unlock_amount,
            locked_bonus_unlocked: false,
            version: 0,
            created_at: to_millis(now),
        };

        if let Err(e) = users::insert(&self.pool, &record).await {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return Err(BillingError::Validation(format!("이미 사용 중인 사용자 이름: {}", username)));
                }
            }
            return Err(e.into());
        }

        info!(
            "👤 사용자 가입: {} ({}) 추천인={:?}",
            record.username, record.id, record.referred_by
        );

        Ok(record.into())
    }

    /// 입금
    ///
    /// 입금 기록, 프로모션 보너스, 추천 보너스 해제를 하나의 트랜잭션으로 처리합니다.
    pub async fn deposit(
        &self,
        user_id: &str,
        amount: Decimal,
        promo_code: Option<&str>,
    ) -> Result<DepositReceipt, BillingError> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount("입금액은 0보다 커야 합니다".to_string()));
        }

        let promo_code = promo_code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        match self.deposit_once(user_id, amount, promo_code.as_deref()).await {
            Err(e) if e.is_conflict() => {
                warn!("입금 처리 충돌, 재시도: user={}", user_id);
                self.deposit_once(user_id, amount, promo_code.as_deref())
                    .await
                    .map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    async fn deposit_once(
        &self,
        user_id: &str,
        amount: Decimal,
        promo_code: Option<&str>,
    ) -> Result<DepositReceipt, BillingError> {
        let now = Utc::now();
        let amount = round_money(amount);
        let mut tx = self.pool.begin().await?;

        let deposit = apply_in_tx(
            &mut *tx,
            &LedgerRequest::new(user_id, TransactionType::Deposit, amount, "잔고 충전"),
            now,
        )
        .await?;
        let mut last: LedgerReceipt = deposit.clone();

        let mut bonus_amount = None;
        if let Some(code) = promo_code {
            let promo = promo::redeem(&mut *tx, code, to_cents(amount)?)
                .await?
                .ok_or_else(|| BillingError::Validation(format!("사용할 수 없는 프로모션 코드: {}", code)))?;

            let bonus = amount
                .checked_mul(bps_to_percent(promo.bonus_percent))
                .map(|b| round_money(b / Decimal::ONE_HUNDRED))
                .ok_or_else(|| BillingError::InvalidAmount(format!("표현할 수 없는 보너스: {}", amount)))?;
            if bonus > Decimal::ZERO {
                last = apply_in_tx(
                    &mut *tx,
                    &LedgerRequest::new(
                        user_id,
                        TransactionType::Deposit,
                        bonus,
                        format!("프로모션 보너스 ({})", promo.code),
                    ),
                    now,
                )
                .await?;
                bonus_amount = Some(bonus);
            }
        }

        let referral_bonus = unlock_in_tx(&mut *tx, user_id, amount, now).await?;

        tx.commit().await?;

        let new_balance = last.new_balance + referral_bonus.unwrap_or(Decimal::ZERO);
        info!(
            "💰 입금 완료: user={} amount={} promo={:?} referral={:?} 잔고={}",
            user_id, amount, bonus_amount, referral_bonus, new_balance
        );

        Ok(DepositReceipt {
            transaction_id: deposit.transaction_id,
            new_balance,
            bonus_amount,
            referral_bonus,
        })
    }

    /// 잔고 요약
    pub async fn balance_summary(&self, user_id: &str) -> Result<BalanceSummary, BillingError> {
        let user = users::find(&self.pool, user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;
        let schedule = tiers::load_schedule(&self.pool).await?;

        let total_spent = from_cents(user.total_spent);
        let tier = schedule.tier_for(total_spent);

        Ok(BalanceSummary {
            balance: from_cents(user.balance),
            total_spent,
            current_discount: bps_to_percent(user.current_discount),
            discount_tier: tier.name.clone(),
            locked_bonus: from_cents(user.locked_bonus),
            unlock_amount: from_cents(user.locked_bonus_unlock_amount),
            next_tier: schedule.next_tier(total_spent).map(|t| t.name.clone()),
            progress_to_next_tier: schedule.progress_to_next_tier(total_spent),
        })
    }

    /// 할인 등급표
    pub async fn discount_tiers(&self) -> Result<Vec<DiscountTier>, BillingError> {
        let schedule = tiers::load_schedule(&self.pool).await?;
        Ok(schedule.tiers().to_vec())
    }

    /// 할인 등급표 교체 (관리자)
    pub async fn configure_tiers(&self, tier_list: Vec<DiscountTier>) -> Result<Vec<DiscountTier>, BillingError> {
        let schedule = TierSchedule::new(tier_list)?;
        tiers::replace_all(&self.pool, &schedule).await?;
        info!("할인 등급표 갱신: {}개", schedule.tiers().len());
        Ok(schedule.tiers().to_vec())
    }

    /// 사용자 할인율을 적용한 가격 견적
    pub async fn quote(&self, user_id: &str, base_price: Decimal, is_renewal: bool) -> Result<PriceQuote, BillingError> {
        if base_price.is_sign_negative() {
            return Err(BillingError::InvalidAmount("기본 가격은 음수일 수 없습니다".to_string()));
        }
        let account = self.ledger.account(user_id).await?;
        Ok(self.pricing.quote(base_price, account.current_discount, is_renewal))
    }

    /// 프로모션 코드 등록 (관리자)
    pub async fn create_promo_code(&self, new_code: NewPromoCode, now: DateTime<Utc>) -> Result<PromoCodeRecord, BillingError> {
        let code = new_code.code.trim().to_uppercase();
        if code.is_empty() {
            return Err(BillingError::Validation("프로모션 코드가 필요합니다".to_string()));
        }
        if new_code.bonus_percent <= Decimal::ZERO || new_code.bonus_percent > Decimal::ONE_HUNDRED {
            return Err(BillingError::Validation("보너스 비율은 0 초과 100 이하여야 합니다".to_string()));
        }
        if new_code.min_deposit.is_sign_negative() || new_code.max_uses.map_or(false, |m| m <= 0) {
            return Err(BillingError::Validation("프로모션 조건이 올바르지 않습니다".to_string()));
        }

        let record = PromoCodeRecord {
            code,
            bonus_percent: percent_to_bps(new_code.bonus_percent)?,
            min_deposit: to_cents(new_code.min_deposit)?,
            max_uses: new_code.max_uses,
            used_count: 0,
            active: true,
            created_at: to_millis(now),
        };

        if promo::find(&self.pool, &record.code).await?.is_some() {
            return Err(BillingError::Validation(format!("이미 존재하는 프로모션 코드: {}", record.code)));
        }
        promo::insert(&self.pool, &record).await?;

        Ok(record)
    }
}

fn generate_referral_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_ne!(code, generate_referral_code());
    }
}
