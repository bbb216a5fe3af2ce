//! 외부 사이트 게재 연동
//!
//! 실제 게시(WordPress 등)는 이 트레이트 뒤의 외부 구성요소가 수행합니다.
//! 호출은 항상 DB 트랜잭션 밖에서 이루어집니다.

use async_trait::async_trait;
use log::info;

use crate::placement::model::PlacementType;

/// 게재 작업 정보
#[derive(Debug, Clone)]
pub struct PublishJob {
    pub placement_id: String,
    pub placement_type: PlacementType,
    pub site_url: String,
    pub title: String,
    pub url: Option<String>,
    pub body: Option<String>,
}

/// 외부 게재 실패
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct PublishError(pub String);

/// 사이트 게재 연동
#[async_trait]
pub trait SitePublisher: Send + Sync {
    /// 콘텐츠 게시
    async fn publish(&self, job: &PublishJob) -> Result<(), PublishError>;

    /// 게시 철회 (취소/만료 후)
    async fn unpublish(&self, job: &PublishJob) -> Result<(), PublishError>;
}

/// 로그만 남기는 기본 구현
#[derive(Debug, Default, Clone)]
pub struct LoggingPublisher;

#[async_trait]
impl SitePublisher for LoggingPublisher {
    async fn publish(&self, job: &PublishJob) -> Result<(), PublishError> {
        info!(
            "📤 게재: {} {} -> {} ({})",
            job.placement_type, job.title, job.site_url, job.placement_id
        );
        Ok(())
    }

    async fn unpublish(&self, job: &PublishJob) -> Result<(), PublishError> {
        info!("📥 게재 철회: {} ({})", job.site_url, job.placement_id);
        Ok(())
    }
}
