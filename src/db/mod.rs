pub mod models;
pub mod repository;

use std::str::FromStr;
use std::time::Duration;

use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Error as SqlxError;

use crate::billing::discount::{default_tiers, TierSchedule};
use crate::billing::error::BillingError;
use crate::db::repository::tiers;

/// SQLite 데이터베이스 초기화 및 연결
pub async fn init_database(database_url: &str) -> Result<SqlitePool, BillingError> {
    info!("🗄️  SQLite 데이터베이스 초기화 중... ({})", database_url);

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10))
        .foreign_keys(true);

    // 연결 풀 생성
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(15))
        .connect_with(options)
        .await?;

    // 테이블 생성
    create_tables(&pool).await?;
    seed_discount_tiers(&pool).await?;

    info!("✅ 데이터베이스 초기화 완료");

    Ok(pool)
}

/// 필요한 테이블 생성
async fn create_tables(pool: &SqlitePool) -> Result<(), SqlxError> {
    // 사용자 계정 (잔고 / 누적 지출 / 추천 보너스)
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            referral_code TEXT NOT NULL UNIQUE,
            referred_by TEXT REFERENCES users(id),
            initial_balance INTEGER NOT NULL DEFAULT 0,
            balance INTEGER NOT NULL DEFAULT 0,
            total_spent INTEGER NOT NULL DEFAULT 0,
            current_discount INTEGER NOT NULL DEFAULT 0,
            locked_bonus INTEGER NOT NULL DEFAULT 0,
            locked_bonus_unlock_amount INTEGER NOT NULL DEFAULT 0,
            locked_bonus_unlocked INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 원장 (추가 전용)
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            transaction_type TEXT NOT NULL CHECK (transaction_type IN
                ('deposit', 'purchase', 'renewal', 'auto_renewal', 'refund', 'admin_adjustment', 'referral')),
            amount INTEGER NOT NULL CHECK (amount <> 0),
            balance_before INTEGER NOT NULL,
            balance_after INTEGER NOT NULL,
            description TEXT NOT NULL,
            placement_id TEXT,
            created_at INTEGER NOT NULL,
            CHECK (balance_after = balance_before + amount)
        )"
    )
    .execute(pool)
    .await?;

    // 할인 등급
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS discount_tiers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            min_spent INTEGER NOT NULL UNIQUE,
            discount_percentage INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 파트너 사이트
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sites (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            site_url TEXT NOT NULL UNIQUE,
            price_link INTEGER NOT NULL,
            price_article INTEGER NOT NULL,
            max_links INTEGER NOT NULL,
            max_articles INTEGER NOT NULL,
            used_links INTEGER NOT NULL DEFAULT 0,
            used_articles INTEGER NOT NULL DEFAULT 0,
            available INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 프로젝트
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            name TEXT NOT NULL,
            description TEXT,
            created_at INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 프로젝트 콘텐츠 (링크 / 아티클)
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS project_content (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            content_type TEXT NOT NULL CHECK (content_type IN ('link', 'article')),
            title TEXT NOT NULL,
            url TEXT,
            body TEXT,
            created_at INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 게재
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS placements (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            project_id TEXT NOT NULL REFERENCES projects(id),
            site_id TEXT NOT NULL REFERENCES sites(id),
            content_id TEXT NOT NULL REFERENCES project_content(id),
            placement_type TEXT NOT NULL CHECK (placement_type IN ('link', 'article')),
            status TEXT NOT NULL CHECK (status IN
                ('scheduled', 'placed', 'expired', 'cancelled', 'rejected', 'failed')),
            base_price INTEGER NOT NULL,
            discount_applied INTEGER NOT NULL,
            final_price INTEGER NOT NULL,
            renewal_price INTEGER NOT NULL,
            purchased_at INTEGER NOT NULL,
            scheduled_publish_date INTEGER,
            published_at INTEGER,
            expires_at INTEGER,
            auto_renewal INTEGER NOT NULL DEFAULT 0,
            renewal_count INTEGER NOT NULL DEFAULT 0,
            last_renewed_at INTEGER,
            publish_claim TEXT,
            publish_claimed_at INTEGER,
            failure_reason TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL,
            CHECK (auto_renewal = 0 OR placement_type = 'link')
        )"
    )
    .execute(pool)
    .await?;

    // 알림
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            metadata TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 입금 프로모션 코드
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS promo_codes (
            code TEXT PRIMARY KEY,
            bonus_percent INTEGER NOT NULL,
            min_deposit INTEGER NOT NULL DEFAULT 0,
            max_uses INTEGER,
            used_count INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        )"
    )
    .execute(pool)
    .await?;

    // 인덱스 생성
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id, created_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_placements_user ON placements(user_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_placements_status_expiry ON placements(status, expires_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_placements_status_schedule ON placements(status, scheduled_publish_date)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_placements_content_site ON placements(content_id, site_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at)")
        .execute(pool)
        .await?;

    info!("📋 테이블 생성 완료");

    Ok(())
}

/// 등급표가 비어 있으면 기본 등급을 채움
async fn seed_discount_tiers(pool: &SqlitePool) -> Result<(), BillingError> {
    if tiers::count(pool).await? > 0 {
        return Ok(());
    }

    let schedule = TierSchedule::new(default_tiers())?;
    tiers::replace_all(pool, &schedule).await?;

    info!("기본 할인 등급 {}개 생성", schedule.tiers().len());

    Ok(())
}
