use std::sync::Arc;

use axum::Router;
use log::{error, info};
use sqlx::sqlite::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::create_api_router;
use crate::billing::service::BillingService;
use crate::catalog::CatalogService;
use crate::config::AppConfig;
use crate::db::init_database;
use crate::notification::NotificationCenter;
use crate::placement::batch::BatchRegistry;
use crate::placement::lifecycle::PlacementManager;
use crate::placement::publisher::{LoggingPublisher, SitePublisher};
use crate::placement::sweeper::run_sweep_loop;

/// 서버 상태
#[derive(Clone)]
pub struct ServerState {
    pub billing: Arc<BillingService>,
    pub placements: Arc<PlacementManager>,
    pub catalog: Arc<CatalogService>,
    pub notifications: Arc<NotificationCenter>,
    pub batches: BatchRegistry,
}

impl ServerState {
    pub fn new(pool: SqlitePool, config: &AppConfig, publisher: Arc<dyn SitePublisher>) -> Self {
        let billing = BillingService::new(pool.clone(), config.billing.clone());
        let placements = PlacementManager::new(
            pool.clone(),
            publisher,
            billing.pricing().clone(),
            config.lifecycle.clone(),
        );

        Self {
            billing: Arc::new(billing),
            placements: Arc::new(placements),
            catalog: Arc::new(CatalogService::new(pool.clone())),
            notifications: Arc::new(NotificationCenter::new(pool)),
            batches: BatchRegistry::new(),
        }
    }
}

/// REST 라우터 조립
pub fn build_router(state: ServerState) -> Router {
    create_api_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 서버 시작
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("linkmarket 서버 시작 중...");

    let pool = init_database(&config.database_url).await?;
    let state = ServerState::new(pool, &config, Arc::new(LoggingPublisher::default()));

    // 게시/자동 연장/만료 스윕 태스크
    let sweeper = state.placements.clone();
    let period = config.sweep_interval;
    tokio::spawn(async move {
        run_sweep_loop(sweeper, period).await;
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.rest_port)).await?;

    info!("🚀 서버가 성공적으로 시작되었습니다!");
    info!("REST API: http://localhost:{}", config.rest_port);

    if let Err(e) = axum::serve(listener, app).await {
        error!("REST 서버 오류: {}", e);
        return Err(e.into());
    }

    Ok(())
}
