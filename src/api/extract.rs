//! 요청 주체 추출
//!
//! 인증은 앞단 게이트웨이가 처리하고 `X-User-Id`, `X-User-Role` 헤더로 전달합니다.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Json;

use crate::api::models::ErrorResponse;
use crate::placement::model::Actor;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// 요청 사용자
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub is_admin: bool,
}

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        if self.is_admin {
            Actor::Admin(self.id.clone())
        } else {
            Actor::User(self.id.clone())
        }
    }
}

/// 관리자 전용 요청
#[derive(Debug, Clone)]
pub struct AdminUser(pub String);

impl AdminUser {
    pub fn actor(&self) -> Actor {
        Actor::Admin(self.0.clone())
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_admin(parts: &Parts) -> bool {
    header_value(parts, USER_ROLE_HEADER).map_or(false, |role| role.eq_ignore_ascii_case("admin"))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, USER_ID_HEADER).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "UNAUTHENTICATED".to_string(),
                    message: "사용자 정보가 없습니다".to_string(),
                }),
            )
        })?;

        Ok(CurrentUser {
            id,
            is_admin: is_admin(parts),
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if !is_admin(parts) {
            return Err((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: "FORBIDDEN".to_string(),
                    message: "관리자 권한이 필요합니다".to_string(),
                }),
            ));
        }

        Ok(AdminUser(
            header_value(parts, USER_ID_HEADER).unwrap_or_else(|| "admin".to_string()),
        ))
    }
}
