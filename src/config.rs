//! 환경 변수 기반 설정
//!
//! `.env` 파일이 있으면 먼저 읽고, 없는 값은 기본값을 사용합니다.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use rust_decimal::Decimal;

/// 결제 관련 설정
#[derive(Debug, Clone)]
pub struct BillingSettings {
    /// 추천 가입 시 잠금 보너스 금액
    pub referral_locked_bonus: Decimal,
    /// 잠금 보너스 해제에 필요한 1회 입금액
    pub referral_unlock_amount: Decimal,
    /// 연장 시 개인 할인에 곱해지는 추가 할인율 (%)
    pub renewal_discount: Decimal,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            referral_locked_bonus: Decimal::from(50),
            referral_unlock_amount: Decimal::from(100),
            renewal_discount: Decimal::ZERO,
        }
    }
}

/// 게재 수명주기 설정
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// 링크 게재 기간 (일)
    pub link_term_days: i64,
    /// 만료 며칠 전부터 자동 연장을 시도할지
    pub auto_renewal_window_days: i64,
    /// 게재 작업 선점 유효 시간 (초)
    pub publish_claim_ttl_secs: i64,
}

impl LifecycleSettings {
    pub fn link_term(&self) -> chrono::Duration {
        chrono::Duration::days(self.link_term_days)
    }

    pub fn auto_renewal_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.auto_renewal_window_days)
    }

    pub fn publish_claim_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.publish_claim_ttl_secs)
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            link_term_days: 30,
            auto_renewal_window_days: 7,
            publish_claim_ttl_secs: 300,
        }
    }
}

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub rest_port: u16,
    pub sweep_interval: Duration,
    pub billing: BillingSettings,
    pub lifecycle: LifecycleSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:linkmarket.db".to_string(),
            rest_port: 3003,
            sweep_interval: Duration::from_secs(300),
            billing: BillingSettings::default(),
            lifecycle: LifecycleSettings::default(),
        }
    }
}

impl AppConfig {
    /// `.env` 와 환경 변수에서 설정 로드
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = AppConfig::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            rest_port: read_var("REST_PORT", defaults.rest_port),
            sweep_interval: Duration::from_secs(read_var(
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )),
            billing: BillingSettings {
                referral_locked_bonus: read_var("REFERRAL_LOCKED_BONUS", defaults.billing.referral_locked_bonus),
                referral_unlock_amount: read_var("REFERRAL_UNLOCK_AMOUNT", defaults.billing.referral_unlock_amount),
                renewal_discount: read_var("RENEWAL_DISCOUNT_PERCENT", defaults.billing.renewal_discount),
            },
            lifecycle: LifecycleSettings {
                link_term_days: read_var("LINK_TERM_DAYS", defaults.lifecycle.link_term_days),
                auto_renewal_window_days: read_var(
                    "AUTO_RENEWAL_WINDOW_DAYS",
                    defaults.lifecycle.auto_renewal_window_days,
                ),
                publish_claim_ttl_secs: read_var(
                    "PUBLISH_CLAIM_TTL_SECS",
                    defaults.lifecycle.publish_claim_ttl_secs,
                ),
            },
        }
    }
}

fn read_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("환경 변수 {} 값 '{}' 을(를) 해석할 수 없어 기본값을 사용합니다", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rest_port, 3003);
        assert_eq!(config.lifecycle.link_term(), chrono::Duration::days(30));
        assert_eq!(config.billing.referral_unlock_amount, Decimal::from(100));
    }

    #[test]
    fn test_unparsable_value_falls_back() {
        env::set_var("LINKMARKET_TEST_PORT", "not-a-port");
        assert_eq!(read_var::<u16>("LINKMARKET_TEST_PORT", 42), 42);
        env::set_var("LINKMARKET_TEST_PORT", " 8080 ");
        assert_eq!(read_var::<u16>("LINKMARKET_TEST_PORT", 42), 8080);
        env::remove_var("LINKMARKET_TEST_PORT");
    }
}
