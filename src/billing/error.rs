//! 결제 원장 / 게재 수명주기 공통 에러 타입

use rust_decimal::Decimal;

/// 원장 및 게재 처리 에러
///
/// 검증 에러와 비즈니스 규칙 에러는 호출자에게 그대로 노출해도 안전합니다.
/// `Database` 의 내부 메시지는 API 응답에 절대 포함하지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("유효하지 않은 금액: {0}")]
    InvalidAmount(String),
    #[error("잘못된 요청: {0}")]
    Validation(String),
    #[error("{0}을(를) 찾을 수 없습니다")]
    NotFound(String),
    #[error("잔고 부족 (필요: {required}, 보유: {available})")]
    InsufficientFunds { required: Decimal, available: Decimal },
    #[error("사이트 게재 한도 초과: {0}")]
    SiteCapacityExceeded(String),
    #[error("추천 보너스가 이미 지급되었습니다")]
    AlreadyUnlocked,
    #[error("허용되지 않는 상태 전환: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("자동 연장은 링크 게재에만 설정할 수 있습니다")]
    AutoRenewalNotAllowed,
    #[error("권한이 없습니다")]
    Forbidden,
    #[error("동시 수정 충돌: {0}")]
    Conflict(String),
    #[error("일시적인 충돌이 발생했습니다. 잠시 후 다시 시도해 주세요")]
    Transient,
    #[error("데이터베이스 오류: {0}")]
    Database(sqlx::Error),
}

impl BillingError {
    /// 재시도 대상 충돌 여부
    pub fn is_conflict(&self) -> bool {
        matches!(self, BillingError::Conflict(_))
    }

    /// 한 번 재시도한 뒤에도 충돌이면 일시 장애로 승격
    pub fn escalate(self) -> Self {
        if self.is_conflict() {
            BillingError::Transient
        } else {
            self
        }
    }

    /// API 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::InvalidAmount(_) => "INVALID_AMOUNT",
            BillingError::Validation(_) => "VALIDATION_ERROR",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            BillingError::SiteCapacityExceeded(_) => "SITE_CAPACITY_EXCEEDED",
            BillingError::AlreadyUnlocked => "ALREADY_UNLOCKED",
            BillingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BillingError::AutoRenewalNotAllowed => "AUTO_RENEWAL_NOT_ALLOWED",
            BillingError::Forbidden => "FORBIDDEN",
            BillingError::Conflict(_) | BillingError::Transient => "TRANSIENT_CONFLICT",
            BillingError::Database(_) => "INTERNAL_ERROR",
        }
    }

    /// 사용자에게 보여줄 메시지 (내부 DB 메시지 제외)
    pub fn public_message(&self) -> String {
        match self {
            BillingError::Database(_) => "내부 오류가 발생했습니다".to_string(),
            BillingError::Conflict(_) => BillingError::Transient.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        if is_lock_contention(&e) {
            BillingError::Conflict(e.to_string())
        } else {
            BillingError::Database(e)
        }
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED 계열 및 풀 대기 초과
fn is_lock_contention(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6") | Some("261") | Some("262") | Some("517"))
                || db.message().contains("database is locked")
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalate_only_conflicts() {
        let escalated = BillingError::Conflict("busy".into()).escalate();
        assert!(matches!(escalated, BillingError::Transient));

        let untouched = BillingError::AlreadyUnlocked.escalate();
        assert!(matches!(untouched, BillingError::AlreadyUnlocked));
    }

    #[test]
    fn test_database_message_hidden() {
        let err = BillingError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.public_message().contains("no rows"));
    }

    #[test]
    fn test_pool_timeout_is_conflict() {
        let err: BillingError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_conflict());
    }
}
