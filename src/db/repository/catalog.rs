use sqlx::{Executor, Sqlite};

use crate::db::models::{ContentRecord, ProjectRecord, SiteRecord};
use crate::placement::model::PlacementType;

/// 사이트 등록
pub async fn insert_site<'e, E>(executor: E, site: &SiteRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO sites
         (id, name, site_url, price_link, price_article, max_links, max_articles, used_links, used_articles, available, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&site.id)
    .bind(&site.name)
    .bind(&site.site_url)
    .bind(site.price_link)
    .bind(site.price_article)
    .bind(site.max_links)
    .bind(site.max_articles)
    .bind(site.used_links)
    .bind(site.used_articles)
    .bind(site.available)
    .bind(site.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 사이트 조회
pub async fn find_site<'e, E>(executor: E, site_id: &str) -> Result<Option<SiteRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, SiteRecord>("SELECT * FROM sites WHERE id = ?")
        .bind(site_id)
        .fetch_optional(executor)
        .await
}

/// 구매 가능한 사이트 목록
pub async fn list_available_sites<'e, E>(executor: E) -> Result<Vec<SiteRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, SiteRecord>("SELECT * FROM sites WHERE available = 1 ORDER BY name ASC")
        .fetch_all(executor)
        .await
}

/// 게재 슬롯 1개 예약 (남은 슬롯이 없으면 false)
pub async fn reserve_slot<'e, E>(executor: E, site_id: &str, placement_type: PlacementType) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = match placement_type {
        PlacementType::Link => {
            "UPDATE sites SET used_links = used_links + 1 WHERE id = ? AND used_links < max_links"
        }
        PlacementType::Article => {
            "UPDATE sites SET used_articles = used_articles + 1 WHERE id = ? AND used_articles < max_articles"
        }
    };

    let result = sqlx::query(sql).bind(site_id).execute(executor).await?;

    Ok(result.rows_affected() == 1)
}

/// 게재 슬롯 반환
pub async fn release_slot<'e, E>(executor: E, site_id: &str, placement_type: PlacementType) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = match placement_type {
        PlacementType::Link => {
            "UPDATE sites SET used_links = used_links - 1 WHERE id = ? AND used_links > 0"
        }
        PlacementType::Article => {
            "UPDATE sites SET used_articles = used_articles - 1 WHERE id = ? AND used_articles > 0"
        }
    };

    sqlx::query(sql).bind(site_id).execute(executor).await?;

    Ok(())
}

/// 프로젝트 생성
pub async fn insert_project<'e, E>(executor: E, project: &ProjectRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO projects (id, user_id, name, description, created_at) VALUES (?, ?, ?, ?, ?)"
    )
    .bind(&project.id)
    .bind(&project.user_id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 프로젝트 조회
pub async fn find_project<'e, E>(executor: E, project_id: &str) -> Result<Option<ProjectRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, ProjectRecord>("SELECT * FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(executor)
        .await
}

/// 사용자별 프로젝트 목록
pub async fn find_projects_by_user<'e, E>(executor: E, user_id: &str) -> Result<Vec<ProjectRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, ProjectRecord>(
        "SELECT * FROM projects WHERE user_id = ? ORDER BY created_at DESC"
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// 프로젝트 콘텐츠 추가
pub async fn insert_content<'e, E>(executor: E, content: &ContentRecord) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO project_content (id, project_id, content_type, title, url, body, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&content.id)
    .bind(&content.project_id)
    .bind(&content.content_type)
    .bind(&content.title)
    .bind(&content.url)
    .bind(&content.body)
    .bind(content.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// 콘텐츠 조회
pub async fn find_content<'e, E>(executor: E, content_id: &str) -> Result<Option<ContentRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, ContentRecord>("SELECT * FROM project_content WHERE id = ?")
        .bind(content_id)
        .fetch_optional(executor)
        .await
}
