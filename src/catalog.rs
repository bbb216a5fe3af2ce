//! 사이트 / 프로젝트 / 콘텐츠 카탈로그
//!
//! 게재 구매가 참조하는 협력 데이터입니다. 사이트는 링크/아티클 가격과
//! 게재 한도를 가지며, 프로젝트는 사용자가 소유한 링크/아티클 콘텐츠를 묶습니다.

use chrono::{DateTime, Utc};
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::billing::error::BillingError;
use crate::billing::model::to_cents;
use crate::db::models::{to_millis, ContentRecord, ProjectRecord, SiteRecord};
use crate::db::repository::{catalog, users};
use crate::placement::model::PlacementType;

/// 파트너 사이트
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: String,
    pub site_url: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_link: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_article: Decimal,
    pub max_links: i64,
    pub max_articles: i64,
    pub used_links: i64,
    pub used_articles: i64,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// 게재 종류별 기본 가격
    pub fn price_for(&self, placement_type: PlacementType) -> Decimal {
        match placement_type {
            PlacementType::Link => self.price_link,
            PlacementType::Article => self.price_article,
        }
    }
}

/// 프로젝트
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 프로젝트 콘텐츠 (링크는 앵커 텍스트 + URL, 아티클은 제목 + 본문)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    pub project_id: String,
    #[serde(rename = "type")]
    pub content_type: PlacementType,
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 사이트 등록 요청
#[derive(Debug, Clone)]
pub struct NewSite {
    pub name: String,
    pub site_url: String,
    pub price_link: Decimal,
    pub price_article: Decimal,
    pub max_links: i64,
    pub max_articles: i64,
}

/// 카탈로그 서비스
pub struct CatalogService {
    pool: SqlitePool,
}

impl CatalogService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 사이트 등록
    pub async fn create_site(&self, new_site: NewSite, now: DateTime<Utc>) -> Result<Site, BillingError> {
        let site_url = new_site.site_url.trim();
        if site_url.is_empty() {
            return Err(BillingError::Validation("사이트 URL이 필요합니다".to_string()));
        }
        if new_site.price_link.is_sign_negative() || new_site.price_article.is_sign_negative() {
            return Err(BillingError::InvalidAmount("사이트 가격은 음수일 수 없습니다".to_string()));
        }
        if new_site.max_links < 0 || new_site.max_articles < 0 {
            return Err(BillingError::Validation("게재 한도는 음수일 수 없습니다".to_string()));
        }

        let record = SiteRecord {
            id: Uuid::new_v4().to_string(),
            name: if new_site.name.trim().is_empty() {
                site_url.to_string()
            } else {
                new_site.name.trim().to_string()
            },
            site_url: site_url.to_string(),
            price_link: to_cents(new_site.price_link)?,
            price_article: to_cents(new_site.price_article)?,
            max_links: new_site.max_links,
            max_articles: new_site.max_articles,
            used_links: 0,
            used_articles: 0,
            available: true,
            created_at: to_millis(now),
        };

        catalog::insert_site(&self.pool, &record).await?;
        info!("사이트 등록: {} ({})", record.site_url, record.id);

        Ok(record.into())
    }

    /// 사이트 조회
    pub async fn site(&self, site_id: &str) -> Result<Site, BillingError> {
        catalog::find_site(&self.pool, site_id)
            .await?
            .map(Site::from)
            .ok_or_else(|| BillingError::NotFound("사이트".to_string()))
    }

    /// 구매 가능한 사이트 목록
    pub async fn available_sites(&self) -> Result<Vec<Site>, BillingError> {
        let records = catalog::list_available_sites(&self.pool).await?;
        Ok(records.into_iter().map(Site::from).collect())
    }

    /// 프로젝트 생성
    pub async fn create_project(
        &self,
        user_id: &str,
        name: &str,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Project, BillingError> {
        if name.trim().is_empty() {
            return Err(BillingError::Validation("프로젝트 이름이 필요합니다".to_string()));
        }
        if users::find(&self.pool, user_id).await?.is_none() {
            return Err(BillingError::NotFound("사용자".to_string()));
        }

        let record = ProjectRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            description,
            created_at: to_millis(now),
        };

        catalog::insert_project(&self.pool, &record).await?;

        Ok(record.into())
    }

    /// 사용자 프로젝트 목록
    pub async fn projects(&self, user_id: &str) -> Result<Vec<Project>, BillingError> {
        let records = catalog::find_projects_by_user(&self.pool, user_id).await?;
        Ok(records.into_iter().map(Project::from).collect())
    }

    /// 프로젝트에 링크 추가
    pub async fn add_link(
        &self,
        user_id: &str,
        project_id: &str,
        anchor_text: &str,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<ContentItem, BillingError> {
        if anchor_text.trim().is_empty() || url.trim().is_empty() {
            return Err(BillingError::Validation("앵커 텍스트와 URL이 필요합니다".to_string()));
        }
        self.add_content(
            user_id,
            project_id,
            PlacementType::Link,
            anchor_text.trim(),
            Some(url.trim().to_string()),
            None,
            now,
        )
        .await
    }

    /// 프로젝트에 아티클 추가
    pub async fn add_article(
        &self,
        user_id: &str,
        project_id: &str,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<ContentItem, BillingError> {
        if title.trim().is_empty() {
            return Err(BillingError::Validation("아티클 제목이 필요합니다".to_string()));
        }
        self.add_content(
            user_id,
            project_id,
            PlacementType::Article,
            title.trim(),
            None,
            Some(body.to_string()),
            now,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn add_content(
        &self,
        user_id: &str,
        project_id: &str,
        content_type: PlacementType,
        title: &str,
        url: Option<String>,
        body: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<ContentItem, BillingError> {
        let project = catalog::find_project(&self.pool, project_id)
            .await?
            .ok_or_else(|| BillingError::NotFound("프로젝트".to_string()))?;
        if project.user_id != user_id {
            return Err(BillingError::Forbidden);
        }

        let record = ContentRecord {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            content_type: content_type.as_str().to_string(),
            title: title.to_string(),
            url,
            body,
            created_at: to_millis(now),
        };

        catalog::insert_content(&self.pool, &record).await?;

        ContentItem::try_from(record)
    }
}
