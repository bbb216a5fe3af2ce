//! 추천 보너스 해제
//!
//! 잠금 보너스는 기준 금액 이상의 입금이 들어왔을 때 단 한 번 잔고로 지급됩니다.
//! `locked_bonus_unlocked = 0` 조건부 갱신이 성공한 경우에만 지급하므로
//! 재시도되거나 동시에 들어온 입금 이벤트에도 중복 지급이 없습니다.

use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::sqlite::{SqliteConnection, SqlitePool};

use crate::billing::error::BillingError;
use crate::billing::ledger::{apply_in_tx, LedgerRequest};
use crate::billing::model::{from_cents, to_cents, Account, TransactionType};
use crate::db::repository::users;
use crate::notification::{self, Notification, NotificationKind};

/// 추천 보너스 해제기
#[derive(Clone)]
pub struct ReferralBonusUnlocker {
    pool: SqlitePool,
}

impl ReferralBonusUnlocker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 입금 이벤트 처리 (단독 트랜잭션)
    ///
    /// 입금 자체는 이미 기록된 외부 이벤트에 대해 호출합니다. 해제되었으면 `true`.
    pub async fn on_deposit(&self, user_id: &str, deposit_amount: Decimal) -> Result<bool, BillingError> {
        if deposit_amount <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount("입금액은 0보다 커야 합니다".to_string()));
        }

        match self.on_deposit_once(user_id, deposit_amount).await {
            Err(e) if e.is_conflict() => {
                warn!("추천 보너스 처리 충돌, 재시도: user={}", user_id);
                self.on_deposit_once(user_id, deposit_amount)
                    .await
                    .map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    async fn on_deposit_once(&self, user_id: &str, deposit_amount: Decimal) -> Result<bool, BillingError> {
        let mut tx = self.pool.begin().await?;

        users::lock(&mut *tx, user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;

        let unlocked = unlock_in_tx(&mut *tx, user_id, deposit_amount, Utc::now()).await?;
        tx.commit().await?;

        Ok(unlocked.is_some())
    }

    /// 잠금 보너스 부여 (관리자)
    pub async fn grant_locked_bonus(
        &self,
        user_id: &str,
        bonus: Decimal,
        unlock_amount: Decimal,
    ) -> Result<Account, BillingError> {
        if bonus <= Decimal::ZERO {
            return Err(BillingError::InvalidAmount("보너스 금액은 0보다 커야 합니다".to_string()));
        }
        if unlock_amount.is_sign_negative() {
            return Err(BillingError::InvalidAmount("해제 기준 금액은 음수일 수 없습니다".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let user = users::lock(&mut *tx, user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;
        if user.locked_bonus_unlocked {
            return Err(BillingError::AlreadyUnlocked);
        }

        users::set_locked_bonus(&mut *tx, user_id, to_cents(bonus)?, to_cents(unlock_amount)?).await?;

        let account = users::find(&mut *tx, user_id)
            .await?
            .map(Account::from)
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;

        tx.commit().await?;

        info!("잠금 보너스 부여: user={} bonus={} 해제 기준={}", user_id, bonus, unlock_amount);

        Ok(account)
    }
}

/// 진행 중인 트랜잭션 안에서 보너스 해제 시도
///
/// 사용자 행은 호출자가 이미 잠근 상태여야 합니다. 지급된 보너스 금액을 반환합니다.
pub async fn unlock_in_tx(
    conn: &mut SqliteConnection,
    user_id: &str,
    deposit_amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Option<Decimal>, BillingError> {
    let user = users::find(&mut *conn, user_id)
        .await?
        .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;

    if user.locked_bonus_unlocked || user.locked_bonus <= 0 {
        return Ok(None);
    }

    let unlock_amount = from_cents(user.locked_bonus_unlock_amount);
    if deposit_amount < unlock_amount {
        return Ok(None);
    }

    if users::mark_bonus_unlocked(&mut *conn, user_id).await? == 0 {
        return Ok(None);
    }

    let bonus = from_cents(user.locked_bonus);
    let request = LedgerRequest::new(user_id, TransactionType::Referral, bonus, "추천 보너스 해제");
    apply_in_tx(&mut *conn, &request, now).await?;

    notification::emit(
        &mut *conn,
        &Notification::new(
            user_id,
            NotificationKind::BonusUnlocked,
            "추천 보너스가 지급되었습니다",
            format!("{} 이상 입금으로 추천 보너스 {} 이(가) 잔고에 추가되었습니다", unlock_amount, bonus),
            json!({ "bonus": bonus.to_string(), "depositAmount": deposit_amount.to_string() }),
            now,
        ),
    )
    .await?;

    info!("🎁 추천 보너스 해제: user={} bonus={}", user_id, bonus);

    Ok(Some(bonus))
}
