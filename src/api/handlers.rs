use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use log::error;
use uuid::Uuid;

use crate::api::extract::{AdminUser, CurrentUser};
use crate::api::models::*;
use crate::billing::discount::DiscountTier;
use crate::billing::error::BillingError;
use crate::billing::ledger::LedgerReceipt;
use crate::billing::model::{Account, BalanceSummary, LedgerEntry, Reconciliation};
use crate::billing::pricing::PriceQuote;
use crate::billing::service::{DepositReceipt, NewPromoCode};
use crate::catalog::{ContentItem, NewSite, Project, Site};
use crate::notification::Notification;
use crate::placement::batch::BatchOutcome;
use crate::placement::lifecycle::{PurchaseRequest, RefundOutcome, RenewalOutcome, SweepReport};
use crate::placement::model::{Placement, RenewalKind};
use crate::server::ServerState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// 도메인 오류 → HTTP 응답
pub fn api_error(e: BillingError) -> ApiError {
    let status = match &e {
        BillingError::InvalidAmount(_)
        | BillingError::Validation(_)
        | BillingError::InsufficientFunds { .. }
        | BillingError::SiteCapacityExceeded(_)
        | BillingError::AlreadyUnlocked
        | BillingError::AutoRenewalNotAllowed => StatusCode::BAD_REQUEST,
        BillingError::NotFound(_) => StatusCode::NOT_FOUND,
        BillingError::Forbidden => StatusCode::FORBIDDEN,
        BillingError::InvalidTransition { .. } => StatusCode::CONFLICT,
        BillingError::Conflict(_) | BillingError::Transient => StatusCode::SERVICE_UNAVAILABLE,
        BillingError::Database(inner) => {
            error!("데이터베이스 오류: {}", inner);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: e.code().to_string(),
            message: e.public_message(),
        }),
    )
}

// ===== 사용자 / 결제 =====

/// 가입 핸들러
pub async fn register_user(
    State(state): State<ServerState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Account> {
    let account = state
        .billing
        .register_user(
            &payload.username,
            payload.referral_code.as_deref(),
            Utc::now(),
        )
        .await
        .map_err(api_error)?;

    Ok(Json(account))
}

/// 잔고 요약 핸들러
pub async fn get_balance(State(state): State<ServerState>, user: CurrentUser) -> ApiResult<BalanceSummary> {
    let summary = state.billing.balance_summary(&user.id).await.map_err(api_error)?;
    Ok(Json(summary))
}

/// 입금 핸들러
pub async fn deposit(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<DepositRequest>,
) -> ApiResult<DepositReceipt> {
    let receipt = state
        .billing
        .deposit(&user.id, payload.amount, payload.promo_code.as_deref())
        .await
        .map_err(api_error)?;

    Ok(Json(receipt))
}

/// 거래 내역 핸들러
pub async fn get_transactions(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(params): Query<TransactionQuery>,
) -> ApiResult<Vec<LedgerEntry>> {
    let entries = state
        .billing
        .ledger()
        .transactions(&user.id, params.limit.unwrap_or(50), params.offset.unwrap_or(0))
        .await
        .map_err(api_error)?;

    Ok(Json(entries))
}

/// 원장 검증 핸들러
pub async fn reconcile(State(state): State<ServerState>, user: CurrentUser) -> ApiResult<Reconciliation> {
    let result = state.billing.ledger().reconcile(&user.id).await.map_err(api_error)?;
    Ok(Json(result))
}

/// 할인 등급표 핸들러
pub async fn get_discount_tiers(State(state): State<ServerState>) -> ApiResult<Vec<DiscountTier>> {
    let tiers = state.billing.discount_tiers().await.map_err(api_error)?;
    Ok(Json(tiers))
}

/// 가격 견적 핸들러
pub async fn get_pricing(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(params): Query<PricingQuery>,
) -> ApiResult<PriceQuote> {
    let quote = state
        .billing
        .quote(&user.id, params.base_price, params.is_renewal)
        .await
        .map_err(api_error)?;

    Ok(Json(quote))
}

// ===== 게재 =====

/// 게재 구매 핸들러
pub async fn purchase(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<PurchaseRequestBody>,
) -> ApiResult<PurchaseResponse> {
    let request = PurchaseRequest {
        user_id: user.id,
        project_id: payload.project_id,
        site_id: payload.site_id,
        placement_type: payload.placement_type,
        content_ids: payload.content_ids,
        scheduled_date: payload.scheduled_date,
        auto_renewal: payload.auto_renewal,
    };

    let outcome = state
        .placements
        .purchase(request, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(outcome.into()))
}

/// 게재 목록 핸들러
pub async fn list_placements(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(params): Query<PlacementQuery>,
) -> ApiResult<Vec<Placement>> {
    let placements = state
        .placements
        .list(&user.id, params.status)
        .await
        .map_err(api_error)?;

    Ok(Json(placements))
}

/// 게재 조회 핸들러
pub async fn get_placement(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(placement_id): Path<String>,
) -> ApiResult<Placement> {
    let placement = state
        .placements
        .get(&user.actor(), &placement_id)
        .await
        .map_err(api_error)?;

    Ok(Json(placement))
}

/// 수동 연장 핸들러
pub async fn renew_placement(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(placement_id): Path<String>,
) -> ApiResult<RenewResponse> {
    let outcome = state
        .placements
        .renew(&user.actor(), &placement_id, RenewalKind::Manual, Utc::now())
        .await
        .map_err(api_error)?;

    match outcome {
        RenewalOutcome::Renewed {
            placement,
            charged,
            new_balance,
        } => Ok(Json(RenewResponse {
            placement,
            charged,
            new_balance,
        })),
        RenewalOutcome::NotDue => Err(api_error(BillingError::Validation(
            "연장할 수 없는 게재입니다".to_string(),
        ))),
    }
}

/// 즉시 게시 핸들러
pub async fn publish_placement(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(placement_id): Path<String>,
) -> ApiResult<Placement> {
    let placement = state
        .placements
        .publish_now(&user.actor(), &placement_id, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(placement))
}

/// 자동 연장 설정 핸들러
pub async fn set_auto_renewal(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(placement_id): Path<String>,
    Json(payload): Json<AutoRenewalRequest>,
) -> ApiResult<Placement> {
    let placement = state
        .placements
        .set_auto_renewal(&user.actor(), &placement_id, payload.enabled, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(placement))
}

/// 게재 취소 핸들러
pub async fn cancel_placement(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(placement_id): Path<String>,
) -> ApiResult<RefundOutcome> {
    let outcome = state
        .placements
        .cancel(&user.actor(), &placement_id, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(outcome))
}

/// 일괄 취소 핸들러
pub async fn batch_delete(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<BatchRequest>,
) -> ApiResult<BatchOutcome> {
    let batch_id = payload.batch_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let abort = state.batches.register(&batch_id, &user.id).await.map_err(api_error)?;

    let outcome = state
        .placements
        .batch_cancel(&user.actor(), &payload.placement_ids, &abort, Utc::now())
        .await;

    state.batches.finish(&batch_id).await;

    Ok(Json(outcome))
}

/// 일괄 연장 핸들러
pub async fn batch_renew(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<BatchRequest>,
) -> ApiResult<BatchOutcome> {
    let batch_id = payload.batch_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let abort = state.batches.register(&batch_id, &user.id).await.map_err(api_error)?;

    let outcome = state
        .placements
        .batch_renew(&user.actor(), &payload.placement_ids, &abort, Utc::now())
        .await;

    state.batches.finish(&batch_id).await;

    Ok(Json(outcome))
}

/// 일괄 작업 중단 핸들러
pub async fn abort_batch(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(batch_id): Path<String>,
) -> ApiResult<AbortResponse> {
    state.batches.abort(&user.actor(), &batch_id).await.map_err(api_error)?;

    Ok(Json(AbortResponse {
        batch_id,
        aborted: true,
    }))
}

// ===== 카탈로그 =====

/// 프로젝트 생성 핸들러
pub async fn create_project(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    let project = state
        .catalog
        .create_project(&user.id, &payload.name, payload.description, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(project))
}

/// 프로젝트 목록 핸들러
pub async fn list_projects(State(state): State<ServerState>, user: CurrentUser) -> ApiResult<Vec<Project>> {
    let projects = state.catalog.projects(&user.id).await.map_err(api_error)?;
    Ok(Json(projects))
}

/// 링크 추가 핸들러
pub async fn add_link(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
    Json(payload): Json<AddLinkRequest>,
) -> ApiResult<ContentItem> {
    let item = state
        .catalog
        .add_link(&user.id, &project_id, &payload.anchor_text, &payload.url, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(item))
}

/// 아티클 추가 핸들러
pub async fn add_article(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(project_id): Path<String>,
    Json(payload): Json<AddArticleRequest>,
) -> ApiResult<ContentItem> {
    let item = state
        .catalog
        .add_article(&user.id, &project_id, &payload.title, &payload.body, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(item))
}

/// 사이트 목록 핸들러
pub async fn list_sites(State(state): State<ServerState>) -> ApiResult<Vec<Site>> {
    let sites = state.catalog.available_sites().await.map_err(api_error)?;
    Ok(Json(sites))
}

/// 사이트 등록 핸들러 (관리자)
pub async fn create_site(
    State(state): State<ServerState>,
    _admin: AdminUser,
    Json(payload): Json<CreateSiteRequest>,
) -> ApiResult<Site> {
    let site = state
        .catalog
        .create_site(
            NewSite {
                name: payload.name,
                site_url: payload.site_url,
                price_link: payload.price_link,
                price_article: payload.price_article,
                max_links: payload.max_links,
                max_articles: payload.max_articles,
            },
            Utc::now(),
        )
        .await
        .map_err(api_error)?;

    Ok(Json(site))
}

// ===== 알림 =====

/// 알림 목록 핸들러
pub async fn list_notifications(
    State(state): State<ServerState>,
    user: CurrentUser,
    Query(params): Query<NotificationQuery>,
) -> ApiResult<Vec<Notification>> {
    let notifications = state
        .notifications
        .list(&user.id, params.unread_only, params.limit.unwrap_or(50))
        .await
        .map_err(api_error)?;

    Ok(Json(notifications))
}

/// 알림 읽음 처리 핸들러
pub async fn mark_notification_read(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .notifications
        .mark_read(&user.id, &notification_id)
        .await
        .map_err(api_error)?;

    Ok(StatusCode::NO_CONTENT)
}

// ===== 관리자 =====

/// 잔고 조정 핸들러
pub async fn admin_adjust_balance(
    State(state): State<ServerState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
    Json(payload): Json<AdjustBalanceRequest>,
) -> ApiResult<LedgerReceipt> {
    let receipt = state
        .billing
        .ledger()
        .admin_adjust(&user_id, payload.amount, &payload.reason, payload.confirm_negative)
        .await
        .map_err(api_error)?;

    Ok(Json(receipt))
}

/// 잠금 보너스 부여 핸들러
pub async fn admin_grant_bonus(
    State(state): State<ServerState>,
    _admin: AdminUser,
    Path(user_id): Path<String>,
    Json(payload): Json<GrantBonusRequest>,
) -> ApiResult<Account> {
    let account = state
        .billing
        .referral()
        .grant_locked_bonus(&user_id, payload.bonus, payload.unlock_amount)
        .await
        .map_err(api_error)?;

    Ok(Json(account))
}

/// 프로모션 코드 등록 핸들러
pub async fn admin_create_promo(
    State(state): State<ServerState>,
    _admin: AdminUser,
    Json(payload): Json<CreatePromoRequest>,
) -> ApiResult<PromoCodeResponse> {
    let record = state
        .billing
        .create_promo_code(
            NewPromoCode {
                code: payload.code,
                bonus_percent: payload.bonus_percent,
                min_deposit: payload.min_deposit,
                max_uses: payload.max_uses,
            },
            Utc::now(),
        )
        .await
        .map_err(api_error)?;

    Ok(Json(record.into()))
}

/// 할인 등급표 교체 핸들러
pub async fn admin_replace_tiers(
    State(state): State<ServerState>,
    _admin: AdminUser,
    Json(payload): Json<Vec<TierInput>>,
) -> ApiResult<Vec<DiscountTier>> {
    let tiers = state
        .billing
        .configure_tiers(payload.into_iter().map(DiscountTier::from).collect())
        .await
        .map_err(api_error)?;

    Ok(Json(tiers))
}

/// 게재 거절 핸들러
pub async fn admin_reject_placement(
    State(state): State<ServerState>,
    admin: AdminUser,
    Path(placement_id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<RefundOutcome> {
    let outcome = state
        .placements
        .reject(&admin.actor(), &placement_id, &payload.reason, Utc::now())
        .await
        .map_err(api_error)?;

    Ok(Json(outcome))
}

/// 스윕 즉시 실행 핸들러
pub async fn admin_run_sweep(State(state): State<ServerState>, _admin: AdminUser) -> ApiResult<SweepReport> {
    let report = state.placements.sweep(Utc::now()).await;
    Ok(Json(report))
}
