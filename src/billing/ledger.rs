//! 원장 저장소
//!
//! 모든 잔고 변경은 `apply_in_tx` 한 곳을 거칩니다. 사용자 행을 쓰기로 먼저 잠근 뒤
//! 잔고를 읽고, 새 잔고와 원장 행을 같은 트랜잭션 안에서 기록하므로
//! 같은 사용자에 대한 변경은 항상 직렬화됩니다.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::billing::error::BillingError;
use crate::billing::model::{
    bps_to_percent, from_cents, percent_to_bps, round_money, to_cents, Account, LedgerEntry, Reconciliation, TransactionType,
};
use crate::db::models::{to_millis, TransactionRecord};
use crate::db::repository::{tiers, transactions, users};

/// 원장 반영 요청
#[derive(Debug, Clone)]
pub struct LedgerRequest {
    pub user_id: String,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub placement_id: Option<String>,
    /// 잔고가 음수가 되는 것을 허용 (관리자 조정 확인 시에만)
    pub allow_negative: bool,
}

impl LedgerRequest {
    pub fn new(user_id: &str, kind: TransactionType, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            amount,
            description: description.into(),
            placement_id: None,
            allow_negative: false,
        }
    }

    pub fn for_placement(mut self, placement_id: &str) -> Self {
        self.placement_id = Some(placement_id.to_string());
        self
    }

    pub fn allow_negative(mut self, allow: bool) -> Self {
        self.allow_negative = allow;
        self
    }
}

/// 원장 반영 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    pub transaction_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_before: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_discount: Decimal,
}

/// 진행 중인 트랜잭션 안에서 원장 반영
///
/// 호출자는 커밋/롤백을 책임집니다. 실패하면 호출자의 트랜잭션 전체가 버려져야 합니다.
pub async fn apply_in_tx(
    conn: &mut SqliteConnection,
    request: &LedgerRequest,
    now: DateTime<Utc>,
) -> Result<LedgerReceipt, BillingError> {
    let amount = round_money(request.amount);
    if amount.is_zero() {
        return Err(BillingError::InvalidAmount("금액은 0이 될 수 없습니다".to_string()));
    }
    if !request.kind.accepts_sign(amount) {
        return Err(BillingError::InvalidAmount(format!(
            "{} 거래에 허용되지 않는 부호의 금액: {}",
            request.kind, amount
        )));
    }
    let amount_cents = to_cents(amount)?;

    let user = users::lock(&mut *conn, &request.user_id)
        .await?
        .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;

    let balance_after = user
        .balance
        .checked_add(amount_cents)
        .ok_or_else(|| BillingError::InvalidAmount(format!("표현할 수 없는 금액: {}", amount)))?;

    if amount_cents < 0 && balance_after < 0 && !request.allow_negative {
        return Err(BillingError::InsufficientFunds {
            required: -amount,
            available: from_cents(user.balance),
        });
    }

    let (total_spent, current_discount) = if request.kind.is_spend() {
        let total_spent = user.total_spent - amount_cents;
        let schedule = tiers::load_schedule(&mut *conn).await?;
        let tier = schedule.tier_for(from_cents(total_spent));
        (total_spent, percent_to_bps(tier.discount_percentage)?)
    } else {
        (user.total_spent, user.current_discount)
    };

    users::update_balance(&mut *conn, &user.id, balance_after, total_spent, current_discount).await?;

    let record = TransactionRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        transaction_type: request.kind.as_str().to_string(),
        amount: amount_cents,
        balance_before: user.balance,
        balance_after,
        description: request.description.clone(),
        placement_id: request.placement_id.clone(),
        created_at: to_millis(now),
    };
    transactions::insert(&mut *conn, &record).await?;

    debug!(
        "원장 반영: user={} type={} amount={} balance {} -> {}",
        user.id,
        request.kind,
        amount,
        from_cents(user.balance),
        from_cents(balance_after)
    );

    Ok(LedgerReceipt {
        transaction_id: record.id,
        balance_before: from_cents(user.balance),
        new_balance: from_cents(balance_after),
        total_spent: from_cents(total_spent),
        current_discount: bps_to_percent(current_discount),
    })
}

/// 원장 저장소
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 단독 원장 반영 (충돌 시 1회 재시도)
    pub async fn apply_transaction(&self, request: LedgerRequest) -> Result<LedgerReceipt, BillingError> {
        match self.apply_once(&request).await {
            Err(e) if e.is_conflict() => {
                warn!("원장 반영 충돌, 재시도: user={} ({})", request.user_id, e);
                self.apply_once(&request).await.map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    async fn apply_once(&self, request: &LedgerRequest) -> Result<LedgerReceipt, BillingError> {
        let mut tx = self.pool.begin().await?;
        let receipt = apply_in_tx(&mut *tx, request, Utc::now()).await?;
        tx.commit().await?;
        Ok(receipt)
    }

    /// 관리자 잔고 조정
    ///
    /// 음수 잔고는 `confirm_negative` 가 참일 때만 허용됩니다.
    pub async fn admin_adjust(
        &self,
        user_id: &str,
        amount: Decimal,
        reason: &str,
        confirm_negative: bool,
    ) -> Result<LedgerReceipt, BillingError> {
        if reason.trim().is_empty() {
            return Err(BillingError::Validation("조정 사유가 필요합니다".to_string()));
        }

        let request = LedgerRequest::new(
            user_id,
            TransactionType::AdminAdjustment,
            amount,
            format!("관리자 조정: {}", reason.trim()),
        )
        .allow_negative(confirm_negative);

        let receipt = self.apply_transaction(request).await?;
        info!("관리자 잔고 조정: user={} amount={} 잔고={}", user_id, amount, receipt.new_balance);

        Ok(receipt)
    }

    /// 사용자 계정 조회
    pub async fn account(&self, user_id: &str) -> Result<Account, BillingError> {
        users::find(&self.pool, user_id)
            .await?
            .map(Account::from)
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))
    }

    /// 거래 내역 (최신순)
    pub async fn transactions(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<LedgerEntry>, BillingError> {
        let records = transactions::find_by_user(&self.pool, user_id, limit.clamp(1, 500), offset.max(0)).await?;
        records.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// 게재에 연결된 거래 내역
    pub async fn transactions_for_placement(&self, placement_id: &str) -> Result<Vec<LedgerEntry>, BillingError> {
        let records = transactions::find_by_placement(&self.pool, placement_id).await?;
        records.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// 잔고 = 초기 잔고 + 거래 합계 검증
    pub async fn reconcile(&self, user_id: &str) -> Result<Reconciliation, BillingError> {
        let mut tx = self.pool.begin().await?;

        let user = users::find(&mut *tx, user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;
        let sum = transactions::sum_for_user(&mut *tx, user_id).await?;

        tx.commit().await?;

        let consistent = user.initial_balance + sum == user.balance;
        if !consistent {
            warn!(
                "원장 불일치: user={} initial={} sum={} balance={}",
                user_id,
                from_cents(user.initial_balance),
                from_cents(sum),
                from_cents(user.balance)
            );
        }

        Ok(Reconciliation {
            user_id: user.id,
            initial_balance: from_cents(user.initial_balance),
            transaction_sum: from_cents(sum),
            balance: from_cents(user.balance),
            consistent,
        })
    }
}
