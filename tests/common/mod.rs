//! 통합 테스트 공용 도우미
//!
//! 테스트마다 임시 디렉터리에 별도의 SQLite 파일을 만듭니다.
//! (인메모리 DB는 풀의 연결끼리 공유되지 않음)

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use linkmarket::billing::service::BillingService;
use linkmarket::catalog::{CatalogService, NewSite, Site};
use linkmarket::config::AppConfig;
use linkmarket::db::init_database;
use linkmarket::placement::lifecycle::{PlacementManager, PurchaseRequest};
use linkmarket::placement::model::PlacementType;
use linkmarket::placement::publisher::{LoggingPublisher, PublishError, PublishJob, SitePublisher};
use linkmarket::server::ServerState;

pub struct TestEnv {
    pub pool: SqlitePool,
    pub config: AppConfig,
    pub billing: BillingService,
    pub catalog: CatalogService,
    pub manager: Arc<PlacementManager>,
}

/// 새 임시 DB
pub async fn test_pool() -> SqlitePool {
    let path = std::env::temp_dir().join(format!("linkmarket-test-{}.db", Uuid::new_v4()));
    init_database(&format!("sqlite://{}", path.display()))
        .await
        .expect("테스트 DB 초기화 실패")
}

pub async fn setup() -> TestEnv {
    setup_with_publisher(Arc::new(LoggingPublisher::default())).await
}

pub async fn setup_with_publisher(publisher: Arc<dyn SitePublisher>) -> TestEnv {
    let pool = test_pool().await;
    let config = AppConfig::default();
    let billing = BillingService::new(pool.clone(), config.billing.clone());
    let manager = PlacementManager::new(
        pool.clone(),
        publisher,
        billing.pricing().clone(),
        config.lifecycle.clone(),
    );

    TestEnv {
        catalog: CatalogService::new(pool.clone()),
        billing,
        manager: Arc::new(manager),
        config,
        pool,
    }
}

/// API 테스트용 서버 상태
pub async fn server_state() -> ServerState {
    let pool = test_pool().await;
    ServerState::new(pool, &AppConfig::default(), Arc::new(LoggingPublisher::default()))
}

/// 밀리초 단위로 자른 현재 시각 (DB 왕복 후 비교용)
pub fn now_ms() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(Utc::now().timestamp_millis())
        .single()
        .expect("시각 변환 실패")
}

pub fn money(value: &str) -> Decimal {
    value.parse().expect("금액 형식 오류")
}

impl TestEnv {
    /// 사용자 생성 후 잔고만큼 입금
    pub async fn user(&self, name: &str, balance: &str) -> String {
        let id = self
            .billing
            .register_user(name, None, Utc::now())
            .await
            .expect("사용자 생성 실패")
            .id;

        let amount = money(balance);
        if amount > Decimal::ZERO {
            self.billing.deposit(&id, amount, None).await.expect("입금 실패");
        }
        id
    }

    pub async fn site(&self, url: &str, price_link: &str, price_article: &str, capacity: i64) -> Site {
        self.catalog
            .create_site(
                NewSite {
                    name: url.to_string(),
                    site_url: url.to_string(),
                    price_link: money(price_link),
                    price_article: money(price_article),
                    max_links: capacity,
                    max_articles: capacity,
                },
                Utc::now(),
            )
            .await
            .expect("사이트 생성 실패")
    }

    pub async fn project(&self, user_id: &str) -> String {
        self.catalog
            .create_project(user_id, "테스트 프로젝트", None, Utc::now())
            .await
            .expect("프로젝트 생성 실패")
            .id
    }

    pub async fn links(&self, user_id: &str, project_id: &str, count: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let item = self
                .catalog
                .add_link(
                    user_id,
                    project_id,
                    &format!("anchor {}", i),
                    &format!("https://example.com/{}", i),
                    Utc::now(),
                )
                .await
                .expect("링크 추가 실패");
            ids.push(item.id);
        }
        ids
    }

    pub async fn article(&self, user_id: &str, project_id: &str) -> String {
        self.catalog
            .add_article(user_id, project_id, "아티클 제목", "본문", Utc::now())
            .await
            .expect("아티클 추가 실패")
            .id
    }

    /// 즉시 게시 링크 구매
    pub async fn buy_links(
        &self,
        user_id: &str,
        project_id: &str,
        site_id: &str,
        content_ids: Vec<String>,
        auto_renewal: bool,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let outcome = self
            .manager
            .purchase(
                PurchaseRequest {
                    user_id: user_id.to_string(),
                    project_id: project_id.to_string(),
                    site_id: site_id.to_string(),
                    placement_type: PlacementType::Link,
                    content_ids,
                    scheduled_date: None,
                    auto_renewal,
                },
                now,
            )
            .await
            .expect("구매 실패");
        outcome.placements.into_iter().map(|p| p.id).collect()
    }
}

/// 항상 실패하는 게시기
#[derive(Default)]
pub struct FailingPublisher;

#[async_trait]
impl SitePublisher for FailingPublisher {
    async fn publish(&self, job: &PublishJob) -> Result<(), PublishError> {
        Err(PublishError(format!("{} 응답 없음", job.site_url)))
    }

    async fn unpublish(&self, _job: &PublishJob) -> Result<(), PublishError> {
        Ok(())
    }
}
