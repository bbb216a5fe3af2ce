use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::billing::discount::DiscountTier;
use crate::billing::model::{bps_to_percent, from_cents};
use crate::db::models::PromoCodeRecord;
use crate::placement::lifecycle::PurchaseOutcome;
use crate::placement::model::{Placement, PlacementStatus, PlacementType};

/// 에러 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// 가입 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub referral_code: Option<String>,
}

/// 입금 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount: Decimal,
    pub promo_code: Option<String>,
}

/// 거래 내역 조회 파라미터
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// 가격 견적 파라미터
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuery {
    pub base_price: Decimal,
    #[serde(default)]
    pub is_renewal: bool,
}

/// 구매 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequestBody {
    pub project_id: String,
    pub site_id: String,
    #[serde(rename = "type")]
    pub placement_type: PlacementType,
    pub content_ids: Vec<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_renewal: bool,
}

/// 구매 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub placement_ids: Vec<String>,
    pub placements: Vec<Placement>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_charged: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

impl From<PurchaseOutcome> for PurchaseResponse {
    fn from(outcome: PurchaseOutcome) -> Self {
        Self {
            placement_ids: outcome.placements.iter().map(|p| p.id.clone()).collect(),
            placements: outcome.placements,
            total_charged: outcome.total_charged,
            new_balance: outcome.new_balance,
        }
    }
}

/// 게재 목록 조회 파라미터
#[derive(Debug, Deserialize)]
pub struct PlacementQuery {
    pub status: Option<PlacementStatus>,
}

/// 연장 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewResponse {
    pub placement: Placement,
    #[serde(with = "rust_decimal::serde::float")]
    pub charged: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

/// 자동 연장 설정 요청
#[derive(Debug, Deserialize)]
pub struct AutoRenewalRequest {
    pub enabled: bool,
}

/// 일괄 처리 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub placement_ids: Vec<String>,
    /// 중단 요청에 사용할 작업 ID (없으면 서버가 생성)
    pub batch_id: Option<String>,
}

/// 일괄 중단 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortResponse {
    pub batch_id: String,
    pub aborted: bool,
}

/// 거절 요청
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

/// 프로젝트 생성 요청
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

/// 링크 콘텐츠 추가 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLinkRequest {
    pub anchor_text: String,
    pub url: String,
}

/// 아티클 콘텐츠 추가 요청
#[derive(Debug, Deserialize)]
pub struct AddArticleRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// 사이트 등록 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    #[serde(default)]
    pub name: String,
    pub site_url: String,
    pub price_link: Decimal,
    pub price_article: Decimal,
    pub max_links: i64,
    pub max_articles: i64,
}

/// 알림 조회 파라미터
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

/// 관리자 잔고 조정 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustBalanceRequest {
    pub amount: Decimal,
    pub reason: String,
    #[serde(default)]
    pub confirm_negative: bool,
}

/// 잠금 보너스 부여 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBonusRequest {
    pub bonus: Decimal,
    pub unlock_amount: Decimal,
}

/// 프로모션 코드 등록 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromoRequest {
    pub code: String,
    pub bonus_percent: Decimal,
    #[serde(default)]
    pub min_deposit: Decimal,
    pub max_uses: Option<i64>,
}

/// 프로모션 코드 응답
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeResponse {
    pub code: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub bonus_percent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_deposit: Decimal,
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub active: bool,
}

impl From<PromoCodeRecord> for PromoCodeResponse {
    fn from(r: PromoCodeRecord) -> Self {
        Self {
            code: r.code,
            bonus_percent: bps_to_percent(r.bonus_percent),
            min_deposit: from_cents(r.min_deposit),
            max_uses: r.max_uses,
            used_count: r.used_count,
            active: r.active,
        }
    }
}

/// 할인 등급표 교체 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierInput {
    pub name: String,
    pub min_spent: Decimal,
    pub discount_percentage: Decimal,
}

impl From<TierInput> for DiscountTier {
    fn from(t: TierInput) -> Self {
        DiscountTier::new(t.name, t.min_spent, t.discount_percentage)
    }
}
