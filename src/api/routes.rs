use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::api::handlers::*;
use crate::server::ServerState;

/// API 라우터 생성
pub fn create_api_router() -> Router<ServerState> {
    Router::new()
        // 사용자 / 결제 API
        .route("/api/users", post(register_user))
        .route("/api/billing/balance", get(get_balance))
        .route("/api/billing/deposit", post(deposit))
        .route("/api/billing/transactions", get(get_transactions))
        .route("/api/billing/reconcile", get(reconcile))
        .route("/api/billing/discount-tiers", get(get_discount_tiers))
        .route("/api/billing/pricing", get(get_pricing))

        // 게재 API
        .route("/api/placements", get(list_placements))
        .route("/api/placements/purchase", post(purchase))
        .route("/api/placements/batch-delete", post(batch_delete))
        .route("/api/placements/batch-renew", post(batch_renew))
        .route("/api/placements/:placement_id", get(get_placement).delete(cancel_placement))
        .route("/api/placements/:placement_id/renew", post(renew_placement))
        .route("/api/placements/:placement_id/publish", post(publish_placement))
        .route("/api/placements/:placement_id/auto-renewal", patch(set_auto_renewal))
        .route("/api/batches/:batch_id/abort", post(abort_batch))

        // 카탈로그 API
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/:project_id/links", post(add_link))
        .route("/api/projects/:project_id/articles", post(add_article))
        .route("/api/sites", get(list_sites).post(create_site))

        // 알림 API
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:notification_id/read", post(mark_notification_read))

        // 관리자 API
        .route("/api/admin/users/:user_id/adjust", post(admin_adjust_balance))
        .route("/api/admin/users/:user_id/locked-bonus", post(admin_grant_bonus))
        .route("/api/admin/promo-codes", post(admin_create_promo))
        .route("/api/admin/discount-tiers", put(admin_replace_tiers))
        .route("/api/admin/placements/:placement_id/reject", post(admin_reject_placement))
        .route("/api/admin/sweep", post(admin_run_sweep))
}
