//! 게재 수명주기 관리자
//!
//! 구매, 게재, 연장, 취소, 거절, 만료 전환을 담당합니다.
//! 한 게재에 대한 전환은 모두 게재 행을 먼저 쓰기로 잠그는 트랜잭션 안에서 일어나므로
//! 주기 스윕과 사용자 요청이 경합해도 이중 환불이나 이중 연장이 생기지 않습니다.
//! 외부 게시 호출은 선점 토큰으로 직렬화하고 DB 잠금 밖에서 수행합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::billing::error::BillingError;
use crate::billing::ledger::{apply_in_tx, LedgerRequest};
use crate::billing::model::{bps_to_percent, from_cents, percent_to_bps, to_cents, TransactionType};
use crate::billing::pricing::PricingCalculator;
use crate::catalog::Site;
use crate::config::LifecycleSettings;
use crate::db::models::{to_millis, PlacementRecord};
use crate::db::repository::{catalog, placements, users};
use crate::notification::{self, Notification, NotificationKind};
use crate::placement::model::{Actor, Placement, PlacementStatus, PlacementType, RenewalKind};
use crate::placement::publisher::{PublishJob, SitePublisher};

/// 스윕 1회에서 단계별로 처리할 최대 건수
const SWEEP_BATCH_LIMIT: i64 = 500;

/// 구매 요청
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub user_id: String,
    pub project_id: String,
    pub site_id: String,
    pub placement_type: PlacementType,
    pub content_ids: Vec<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub auto_renewal: bool,
}

/// 구매 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub placements: Vec<Placement>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_charged: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

/// 연장 결과
#[derive(Debug, Clone)]
pub enum RenewalOutcome {
    Renewed {
        placement: Placement,
        charged: Decimal,
        new_balance: Decimal,
    },
    /// 자동 연장 조건이 더 이상 맞지 않음 (이미 연장되었거나 해제됨)
    NotDue,
}

/// 취소/거절 환불 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub placement: Placement,
    #[serde(with = "rust_decimal::serde::float")]
    pub refunded: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

/// 스윕 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub published: usize,
    pub failed: usize,
    pub auto_renewed: usize,
    pub renewal_skipped_insufficient: usize,
    pub expired: usize,
    pub errors: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        *self == SweepReport::default()
    }
}

/// 게재 수명주기 관리자
pub struct PlacementManager {
    pool: SqlitePool,
    publisher: Arc<dyn SitePublisher>,
    pricing: PricingCalculator,
    settings: LifecycleSettings,
}

impl PlacementManager {
    pub fn new(
        pool: SqlitePool,
        publisher: Arc<dyn SitePublisher>,
        pricing: PricingCalculator,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            pool,
            publisher,
            pricing,
            settings,
        }
    }

    // ===== 구매 =====

    /// 게재 구매
    ///
    /// 콘텐츠마다 게재 1건과 `purchase` 원장 1건을 하나의 트랜잭션으로 생성합니다.
    /// 예약일이 없거나 이미 지난 게재는 커밋 후 즉시 게시합니다.
    pub async fn purchase(&self, request: PurchaseRequest, now: DateTime<Utc>) -> Result<PurchaseOutcome, BillingError> {
        validate_purchase(&request)?;

        let created = match self.purchase_once(&request, now).await {
            Err(e) if e.is_conflict() => {
                warn!("구매 처리 충돌, 재시도: user={}", request.user_id);
                self.purchase_once(&request, now).await.map_err(BillingError::escalate)
            }
            other => other,
        }?;

        let mut published = Vec::with_capacity(created.placements.len());
        for placement in created.placements {
            if placement.status == PlacementStatus::Scheduled && placement.scheduled_publish_date.is_none() {
                match self.publish_placement(&placement.id, now).await {
                    Ok(updated) => published.push(updated),
                    Err(e) => {
                        warn!("즉시 게시 보류 (스윕에서 재시도): {} ({})", placement.id, e);
                        published.push(placement);
                    }
                }
            } else {
                published.push(placement);
            }
        }

        Ok(PurchaseOutcome {
            placements: published,
            total_charged: created.total_charged,
            new_balance: created.new_balance,
        })
    }

    async fn purchase_once(&self, request: &PurchaseRequest, now: DateTime<Utc>) -> Result<PurchaseOutcome, BillingError> {
        let mut tx = self.pool.begin().await?;

        let user = users::lock(&mut *tx, &request.user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;

        let project = catalog::find_project(&mut *tx, &request.project_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("프로젝트".to_string()))?;
        if project.user_id != user.id {
            return Err(BillingError::Forbidden);
        }

        let site = catalog::find_site(&mut *tx, &request.site_id)
            .await?
            .map(Site::from)
            .ok_or_else(|| BillingError::NotFound("사이트".to_string()))?;
        if !site.available {
            return Err(BillingError::Validation(format!("구매할 수 없는 사이트: {}", site.site_url)));
        }

        for content_id in &request.content_ids {
            let content = catalog::find_content(&mut *tx, content_id)
                .await?
                .ok_or_else(|| BillingError::NotFound(format!("콘텐츠 {}", content_id)))?;
            if content.project_id != project.id {
                return Err(BillingError::Validation(format!(
                    "콘텐츠 {} 은(는) 프로젝트에 속하지 않습니다",
                    content_id
                )));
            }
            if content.content_type != request.placement_type.as_str() {
                return Err(BillingError::Validation(format!(
                    "콘텐츠 {} 의 종류가 {} 가 아닙니다",
                    content_id, request.placement_type
                )));
            }
            if placements::has_live_placement(&mut *tx, content_id, &site.id).await? {
                return Err(BillingError::Validation(format!(
                    "콘텐츠 {} 은(는) 이미 {} 에 게재 중입니다",
                    content_id, site.site_url
                )));
            }
        }

        let discount = bps_to_percent(user.current_discount);
        let base_price = site.price_for(request.placement_type);
        let final_price = self.pricing.price_for(base_price, discount, false);
        let renewal_price = self.pricing.price_for(base_price, discount, true);

        let total = final_price
            .checked_mul(Decimal::from(request.content_ids.len() as i64))
            .ok_or_else(|| BillingError::InvalidAmount(format!("표현할 수 없는 구매 총액: {}", final_price)))?;
        let available = from_cents(user.balance);
        if total > available {
            return Err(BillingError::InsufficientFunds {
                required: total,
                available,
            });
        }

        let scheduled = request.scheduled_date.filter(|date| *date > now);
        let mut new_balance = available;
        let mut created = Vec::with_capacity(request.content_ids.len());

        for content_id in &request.content_ids {
            if !catalog::reserve_slot(&mut *tx, &site.id, request.placement_type).await? {
                return Err(BillingError::SiteCapacityExceeded(site.site_url.clone()));
            }

            let record = PlacementRecord {
                id: Uuid::new_v4().to_string(),
                user_id: user.id.clone(),
                project_id: project.id.clone(),
                site_id: site.id.clone(),
                content_id: content_id.clone(),
                placement_type: request.placement_type.as_str().to_string(),
                status: PlacementStatus::Scheduled.as_str().to_string(),
                base_price: to_cents(base_price)?,
                discount_applied: percent_to_bps(discount)?,
                final_price: to_cents(final_price)?,
                renewal_price: to_cents(renewal_price)?,
                purchased_at: to_millis(now),
                scheduled_publish_date: scheduled.map(to_millis),
                published_at: None,
                expires_at: None,
                auto_renewal: request.auto_renewal,
                renewal_count: 0,
                last_renewed_at: None,
                publish_claim: None,
                publish_claimed_at: None,
                failure_reason: None,
                version: 0,
                updated_at: to_millis(now),
            };
            placements::insert(&mut *tx, &record).await?;

            if final_price > Decimal::ZERO {
                let receipt = apply_in_tx(
                    &mut *tx,
                    &LedgerRequest::new(
                        &user.id,
                        TransactionType::Purchase,
                        -final_price,
                        format!("{} 게재 구매: {}", request.placement_type, site.site_url),
                    )
                    .for_placement(&record.id),
                    now,
                )
                .await?;
                new_balance = receipt.new_balance;
            }

            created.push(Placement::try_from(record)?);
        }

        tx.commit().await?;

        info!(
            "🛒 게재 구매: user={} site={} {}건 합계={} 잔고={}",
            user.id,
            site.site_url,
            created.len(),
            total,
            new_balance
        );

        Ok(PurchaseOutcome {
            placements: created,
            total_charged: total,
            new_balance,
        })
    }

    // ===== 게시 =====

    /// 사용자/관리자 요청에 의한 즉시 게시
    pub async fn publish_now(&self, actor: &Actor, placement_id: &str, now: DateTime<Utc>) -> Result<Placement, BillingError> {
        let placement = self.get(actor, placement_id).await?;
        if placement.status != PlacementStatus::Scheduled {
            return Err(BillingError::InvalidTransition {
                from: placement.status.as_str().to_string(),
                to: PlacementStatus::Placed.as_str().to_string(),
            });
        }
        self.publish_placement(placement_id, now).await
    }

    /// 예약 게재를 게시
    ///
    /// 외부 게시 성공 시 `placed`, 실패 시 `failed` 로 전환됩니다.
    /// 실패해도 구매 금액은 자동 환불되지 않습니다.
    pub async fn publish_placement(&self, placement_id: &str, now: DateTime<Utc>) -> Result<Placement, BillingError> {
        let token = Uuid::new_v4().to_string();

        let claimed = match self.claim(placement_id, &token, now).await {
            Err(e) if e.is_conflict() => {
                warn!("게시 선점 충돌, 재시도: {}", placement_id);
                self.claim(placement_id, &token, now).await.map_err(BillingError::escalate)
            }
            other => other,
        }?;

        let Some(record) = claimed else {
            return Err(self.claim_rejection(placement_id).await);
        };

        let job = self.publish_job(&record).await?;

        match self.publisher.publish(&job).await {
            Ok(()) => self.complete_publish(&record, &token, &job, now).await,
            Err(e) => {
                warn!("❌ 외부 게시 실패: {} ({})", placement_id, e);
                self.fail_publish(&record, &token, &e.to_string(), now).await
            }
        }
    }

    async fn claim(&self, placement_id: &str, token: &str, now: DateTime<Utc>) -> Result<Option<PlacementRecord>, BillingError> {
        let stale_before = to_millis(now - self.settings.publish_claim_ttl());
        let record = placements::claim_for_publish(&self.pool, placement_id, token, to_millis(now), stale_before).await?;
        Ok(record)
    }

    /// 선점에 실패한 이유
    async fn claim_rejection(&self, placement_id: &str) -> BillingError {
        match placements::find(&self.pool, placement_id).await {
            Ok(None) => BillingError::NotFound("게재".to_string()),
            Ok(Some(record)) if record.status != PlacementStatus::Scheduled.as_str() => BillingError::InvalidTransition {
                from: record.status,
                to: PlacementStatus::Placed.as_str().to_string(),
            },
            Ok(Some(_)) => BillingError::Conflict("다른 작업이 이미 게시를 진행 중입니다".to_string()),
            Err(e) => e.into(),
        }
    }

    async fn complete_publish(
        &self,
        record: &PlacementRecord,
        token: &str,
        job: &PublishJob,
        now: DateTime<Utc>,
    ) -> Result<Placement, BillingError> {
        let expires_at = match job.placement_type {
            PlacementType::Link => Some(now + self.settings.link_term()),
            PlacementType::Article => None,
        };

        let mut tx = self.pool.begin().await?;

        let updated = placements::complete_publish(
            &mut *tx,
            &record.id,
            token,
            to_millis(now),
            expires_at.map(to_millis),
        )
        .await?;

        let Some(updated) = updated else {
            drop(tx);
            warn!("게시 완료 반영 실패, 게시 철회: {} (선점 만료 또는 취소됨)", record.id);
            if let Err(e) = self.publisher.unpublish(job).await {
                warn!("게시 철회 실패: {} ({})", record.id, e);
            }
            return Err(self.claim_rejection(&record.id).await);
        };

        notification::emit(
            &mut *tx,
            &Notification::for_placement(
                &record.user_id,
                &record.id,
                NotificationKind::PlacementPublished,
                "게재가 완료되었습니다",
                format!("{} 에 \"{}\" 이(가) 게재되었습니다", job.site_url, job.title),
                now,
            ),
        )
        .await?;

        tx.commit().await?;

        info!("✅ 게시 완료: {} -> {}", record.id, job.site_url);

        Placement::try_from(updated)
    }

    async fn fail_publish(
        &self,
        record: &PlacementRecord,
        token: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Placement, BillingError> {
        let mut tx = self.pool.begin().await?;

        let updated = placements::fail_publish(&mut *tx, &record.id, token, reason, to_millis(now)).await?;
        let Some(updated) = updated else {
            return Err(self.claim_rejection(&record.id).await);
        };

        let placement_type: PlacementType = updated.placement_type.parse()?;
        catalog::release_slot(&mut *tx, &updated.site_id, placement_type).await?;

        notification::emit(
            &mut *tx,
            &Notification::for_placement(
                &record.user_id,
                &record.id,
                NotificationKind::PlacementFailed,
                "게재에 실패했습니다",
                format!("게재에 실패했습니다: {}", reason),
                now,
            ),
        )
        .await?;

        tx.commit().await?;

        Placement::try_from(updated)
    }

    async fn publish_job(&self, record: &PlacementRecord) -> Result<PublishJob, BillingError> {
        let site = catalog::find_site(&self.pool, &record.site_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("사이트".to_string()))?;
        let content = catalog::find_content(&self.pool, &record.content_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("콘텐츠".to_string()))?;

        Ok(PublishJob {
            placement_id: record.id.clone(),
            placement_type: record.placement_type.parse()?,
            site_url: site.site_url,
            title: content.title,
            url: content.url,
            body: content.body,
        })
    }

    async fn unpublish_quietly(&self, record: &PlacementRecord) {
        let job = match self.publish_job(record).await {
            Ok(job) => job,
            Err(e) => {
                warn!("게시 철회 준비 실패: {} ({})", record.id, e);
                return;
            }
        };
        if let Err(e) = self.publisher.unpublish(&job).await {
            warn!("게시 철회 실패: {} ({})", record.id, e);
        }
    }

    // ===== 연장 =====

    /// 링크 게재 연장
    ///
    /// 연장 가격은 기본 가격, 현재 개인 할인, 연장 할인으로 다시 계산되며
    /// 만료일은 `max(expires_at, now)` 기준으로 한 기간 늘어납니다.
    pub async fn renew(
        &self,
        actor: &Actor,
        placement_id: &str,
        kind: RenewalKind,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, BillingError> {
        match self.renew_once(actor, placement_id, kind, now).await {
            Err(e) if e.is_conflict() => {
                warn!("연장 처리 충돌, 재시도: {}", placement_id);
                self.renew_once(actor, placement_id, kind, now)
                    .await
                    .map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    async fn renew_once(
        &self,
        actor: &Actor,
        placement_id: &str,
        kind: RenewalKind,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome, BillingError> {
        let mut tx = self.pool.begin().await?;

        let record = placements::lock(&mut *tx, placement_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("게재".to_string()))?;
        actor.authorize(&record.user_id)?;

        let placement = Placement::try_from(record.clone())?;
        if placement.status != PlacementStatus::Placed {
            return Err(BillingError::InvalidTransition {
                from: placement.status.as_str().to_string(),
                to: PlacementStatus::Placed.as_str().to_string(),
            });
        }
        if !placement.is_renewable() {
            return Err(BillingError::Validation("만료 기한이 없는 게재는 연장할 수 없습니다".to_string()));
        }

        if kind == RenewalKind::Auto {
            let horizon = now + self.settings.auto_renewal_window();
            let due = placement.auto_renewal && placement.expires_at.map_or(false, |at| at <= horizon);
            if !due {
                return Ok(RenewalOutcome::NotDue);
            }
        }

        let user = users::lock(&mut *tx, &record.user_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;

        let price = self
            .pricing
            .price_for(placement.base_price, bps_to_percent(user.current_discount), true);
        let base_expiry = placement.expires_at.map_or(now, |at| at.max(now));
        let new_expiry = base_expiry + self.settings.link_term();

        let (transaction_type, description) = match kind {
            RenewalKind::Manual => (TransactionType::Renewal, "링크 게재 연장"),
            RenewalKind::Auto => (TransactionType::AutoRenewal, "링크 게재 자동 연장"),
        };

        let mut new_balance = from_cents(user.balance);
        if price > Decimal::ZERO {
            let receipt = apply_in_tx(
                &mut *tx,
                &LedgerRequest::new(&record.user_id, transaction_type, -price, description).for_placement(&record.id),
                now,
            )
            .await?;
            new_balance = receipt.new_balance;
        }

        let updated = placements::record_renewal(
            &mut *tx,
            &record.id,
            to_millis(new_expiry),
            to_cents(price)?,
            to_millis(now),
        )
        .await?;

        if kind == RenewalKind::Auto {
            notification::emit(
                &mut *tx,
                &Notification::for_placement(
                    &record.user_id,
                    &record.id,
                    NotificationKind::PlacementAutoRenewed,
                    "링크 게재가 자동 연장되었습니다",
                    format!("{} 이(가) 차감되었고 새 만료일은 {} 입니다", price, new_expiry.format("%Y-%m-%d")),
                    now,
                ),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            "🔁 게재 연장({:?}): {} 금액={} 만료={}",
            kind, record.id, price, new_expiry
        );

        Ok(RenewalOutcome::Renewed {
            placement: Placement::try_from(updated)?,
            charged: price,
            new_balance,
        })
    }

    /// 자동 연장 설정 변경 (링크만 허용)
    pub async fn set_auto_renewal(
        &self,
        actor: &Actor,
        placement_id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Placement, BillingError> {
        match self.set_auto_renewal_once(actor, placement_id, enabled, now).await {
            Err(e) if e.is_conflict() => {
                warn!("자동 연장 설정 충돌, 재시도: {}", placement_id);
                self.set_auto_renewal_once(actor, placement_id, enabled, now)
                    .await
                    .map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    async fn set_auto_renewal_once(
        &self,
        actor: &Actor,
        placement_id: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<Placement, BillingError> {
        let mut tx = self.pool.begin().await?;

        let record = placements::lock(&mut *tx, placement_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("게재".to_string()))?;
        actor.authorize(&record.user_id)?;

        let placement = Placement::try_from(record)?;
        if enabled && placement.placement_type != PlacementType::Link {
            return Err(BillingError::AutoRenewalNotAllowed);
        }
        if placement.status.is_terminal() {
            return Err(BillingError::Validation(format!(
                "{} 상태의 게재는 자동 연장을 변경할 수 없습니다",
                placement.status
            )));
        }

        let updated = placements::set_auto_renewal(&mut *tx, placement_id, enabled, to_millis(now)).await?;
        tx.commit().await?;

        debug!("자동 연장 설정: {} = {}", placement_id, enabled);

        Placement::try_from(updated)
    }

    // ===== 취소 / 거절 / 만료 =====

    /// 게재 취소 (`final_price` 전액 환불)
    pub async fn cancel(&self, actor: &Actor, placement_id: &str, now: DateTime<Utc>) -> Result<RefundOutcome, BillingError> {
        match self.refund_once(actor, placement_id, PlacementStatus::Cancelled, None, now).await {
            Err(e) if e.is_conflict() => {
                warn!("취소 처리 충돌, 재시도: {}", placement_id);
                self.refund_once(actor, placement_id, PlacementStatus::Cancelled, None, now)
                    .await
                    .map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    /// 검수 거절 (관리자, 예약 상태만)
    pub async fn reject(
        &self,
        actor: &Actor,
        placement_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<RefundOutcome, BillingError> {
        if !actor.is_privileged() {
            return Err(BillingError::Forbidden);
        }
        let reason = Some(reason.trim()).filter(|r| !r.is_empty());

        match self.refund_once(actor, placement_id, PlacementStatus::Rejected, reason, now).await {
            Err(e) if e.is_conflict() => {
                warn!("거절 처리 충돌, 재시도: {}", placement_id);
                self.refund_once(actor, placement_id, PlacementStatus::Rejected, reason, now)
                    .await
                    .map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    /// 환불을 동반한 종료 전환
    async fn refund_once(
        &self,
        actor: &Actor,
        placement_id: &str,
        target: PlacementStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RefundOutcome, BillingError> {
        let mut tx = self.pool.begin().await?;

        let record = placements::lock(&mut *tx, placement_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("게재".to_string()))?;
        actor.authorize(&record.user_id)?;

        let previous = Placement::try_from(record.clone())?;
        previous.status.ensure_transition(target)?;

        let updated = placements::set_terminal(&mut *tx, placement_id, target.as_str(), reason, to_millis(now)).await?;
        catalog::release_slot(&mut *tx, &record.site_id, previous.placement_type).await?;

        let refund = from_cents(record.final_price);
        let new_balance = if refund > Decimal::ZERO {
            let description = match target {
                PlacementStatus::Rejected => "게재 거절 환불",
                _ => "게재 취소 환불",
            };
            let receipt = apply_in_tx(
                &mut *tx,
                &LedgerRequest::new(&record.user_id, TransactionType::Refund, refund, description)
                    .for_placement(&record.id),
                now,
            )
            .await?;
            receipt.new_balance
        } else {
            let user = users::find(&mut *tx, &record.user_id)
                .await?
                .ok_or_else(|| BillingError::NotFound("사용자".to_string()))?;
            from_cents(user.balance)
        };

        if target == PlacementStatus::Rejected {
            notification::emit(
                &mut *tx,
                &Notification::for_placement(
                    &record.user_id,
                    &record.id,
                    NotificationKind::PlacementRejected,
                    "게재가 거절되었습니다",
                    format!(
                        "게재가 거절되어 {} 이(가) 환불되었습니다{}",
                        refund,
                        reason.map(|r| format!(" (사유: {})", r)).unwrap_or_default()
                    ),
                    now,
                ),
            )
            .await?;
        }

        tx.commit().await?;

        info!("↩️  게재 {}: {} 환불={} 잔고={}", target, placement_id, refund, new_balance);

        if previous.status == PlacementStatus::Placed {
            self.unpublish_quietly(&updated).await;
        }

        Ok(RefundOutcome {
            placement: Placement::try_from(updated)?,
            refunded: refund,
            new_balance,
        })
    }

    /// 만료 처리 (만료 시각이 지났고 아직 `placed` 인 경우에만)
    pub async fn expire(&self, placement_id: &str, now: DateTime<Utc>) -> Result<Option<Placement>, BillingError> {
        match self.expire_once(placement_id, now).await {
            Err(e) if e.is_conflict() => {
                warn!("만료 처리 충돌, 재시도: {}", placement_id);
                self.expire_once(placement_id, now).await.map_err(BillingError::escalate)
            }
            other => other,
        }
    }

    async fn expire_once(&self, placement_id: &str, now: DateTime<Utc>) -> Result<Option<Placement>, BillingError> {
        let mut tx = self.pool.begin().await?;

        let record = placements::lock(&mut *tx, placement_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("게재".to_string()))?;

        let placement = Placement::try_from(record.clone())?;
        if placement.status != PlacementStatus::Placed || !placement.is_past_expiry(now) {
            return Ok(None);
        }

        let updated = placements::set_terminal(
            &mut *tx,
            placement_id,
            PlacementStatus::Expired.as_str(),
            None,
            to_millis(now),
        )
        .await?;
        catalog::release_slot(&mut *tx, &record.site_id, placement.placement_type).await?;

        notification::emit(
            &mut *tx,
            &Notification::for_placement(
                &record.user_id,
                &record.id,
                NotificationKind::PlacementExpired,
                "링크 게재가 만료되었습니다",
                "게재 기간이 끝나 게재가 만료되었습니다. 다시 구매하여 게재할 수 있습니다",
                now,
            ),
        )
        .await?;

        tx.commit().await?;

        info!("⌛ 게재 만료: {}", placement_id);

        self.unpublish_quietly(&updated).await;

        Ok(Some(Placement::try_from(updated)?))
    }

    // ===== 조회 =====

    /// 게재 조회 (소유자 또는 관리자)
    pub async fn get(&self, actor: &Actor, placement_id: &str) -> Result<Placement, BillingError> {
        let record = placements::find(&self.pool, placement_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("게재".to_string()))?;
        actor.authorize(&record.user_id)?;
        Placement::try_from(record)
    }

    /// 사용자 게재 목록
    pub async fn list(&self, user_id: &str, status: Option<PlacementStatus>) -> Result<Vec<Placement>, BillingError> {
        let records = placements::find_by_user(&self.pool, user_id, status.as_ref().map(PlacementStatus::as_str)).await?;
        records.into_iter().map(Placement::try_from).collect()
    }

    // ===== 주기 스윕 =====

    /// 게시 예정 → 자동 연장 → 만료 순으로 처리
    ///
    /// 각 단계는 사용자 요청과 같은 전환 함수를 호출하므로 동시에 실행되어도 안전합니다.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        self.sweep_publish(now, &mut report).await;
        self.sweep_auto_renew(now, &mut report).await;
        self.sweep_expire(now, &mut report).await;

        if !report.is_empty() {
            info!("🧹 스윕 완료: {:?}", report);
        }

        report
    }

    async fn sweep_publish(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let stale_before = to_millis(now - self.settings.publish_claim_ttl());
        let ids = match placements::due_for_publish_ids(&self.pool, to_millis(now), stale_before, SWEEP_BATCH_LIMIT).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("게시 대상 조회 실패: {}", e);
                report.errors += 1;
                return;
            }
        };

        for id in ids {
            match self.publish_placement(&id, now).await {
                Ok(p) if p.status == PlacementStatus::Placed => report.published += 1,
                Ok(_) => report.failed += 1,
                Err(BillingError::InvalidTransition { .. }) => {}
                Err(e) => {
                    warn!("스윕 게시 실패: {} ({})", id, e);
                    report.errors += 1;
                }
            }
        }
    }

    async fn sweep_auto_renew(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let horizon = to_millis(now + self.settings.auto_renewal_window());
        let ids = match placements::auto_renewal_candidate_ids(&self.pool, horizon, SWEEP_BATCH_LIMIT).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("자동 연장 대상 조회 실패: {}", e);
                report.errors += 1;
                return;
            }
        };

        for id in ids {
            match self.renew(&Actor::System, &id, RenewalKind::Auto, now).await {
                Ok(RenewalOutcome::Renewed { .. }) => report.auto_renewed += 1,
                Ok(RenewalOutcome::NotDue) => {}
                Err(BillingError::InsufficientFunds { required, available }) => {
                    info!("자동 연장 건너뜀 (잔고 부족): {} 필요={} 보유={}", id, required, available);
                    report.renewal_skipped_insufficient += 1;
                }
                Err(BillingError::InvalidTransition { .. }) => {}
                Err(e) => {
                    warn!("스윕 자동 연장 실패: {} ({})", id, e);
                    report.errors += 1;
                }
            }
        }
    }

    async fn sweep_expire(&self, now: DateTime<Utc>, report: &mut SweepReport) {
        let ids = match placements::expired_ids(&self.pool, to_millis(now), SWEEP_BATCH_LIMIT).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("만료 대상 조회 실패: {}", e);
                report.errors += 1;
                return;
            }
        };

        for id in ids {
            match self.expire(&id, now).await {
                Ok(Some(_)) => report.expired += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!("스윕 만료 실패: {} ({})", id, e);
                    report.errors += 1;
                }
            }
        }
    }
}

fn validate_purchase(request: &PurchaseRequest) -> Result<(), BillingError> {
    if request.content_ids.is_empty() {
        return Err(BillingError::Validation("게재할 콘텐츠를 하나 이상 선택해야 합니다".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for id in &request.content_ids {
        if id.trim().is_empty() {
            return Err(BillingError::Validation("빈 콘텐츠 ID".to_string()));
        }
        if !seen.insert(id.as_str()) {
            return Err(BillingError::Validation(format!("중복된 콘텐츠 ID: {}", id)));
        }
    }

    if request.auto_renewal && request.placement_type != PlacementType::Link {
        return Err(BillingError::AutoRenewalNotAllowed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content_ids: &[&str], placement_type: PlacementType, auto_renewal: bool) -> PurchaseRequest {
        PurchaseRequest {
            user_id: "u1".into(),
            project_id: "p1".into(),
            site_id: "s1".into(),
            placement_type,
            content_ids: content_ids.iter().map(|s| s.to_string()).collect(),
            scheduled_date: None,
            auto_renewal,
        }
    }

    #[test]
    fn test_purchase_requires_content() {
        assert!(matches!(
            validate_purchase(&request(&[], PlacementType::Link, false)),
            Err(BillingError::Validation(_))
        ));
    }

    #[test]
    fn test_purchase_rejects_duplicate_content() {
        assert!(matches!(
            validate_purchase(&request(&["c1", "c1"], PlacementType::Link, false)),
            Err(BillingError::Validation(_))
        ));
    }

    #[test]
    fn test_article_cannot_auto_renew() {
        assert!(matches!(
            validate_purchase(&request(&["c1"], PlacementType::Article, true)),
            Err(BillingError::AutoRenewalNotAllowed)
        ));
        assert!(validate_purchase(&request(&["c1", "c2"], PlacementType::Link, true)).is_ok());
    }
}
