//! REST API 통합 테스트
//!
//! 라우터를 직접 호출(`oneshot`)하여 요청/응답 형식과 에러 매핑을 검증합니다.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use linkmarket::api::extract::{USER_ID_HEADER, USER_ROLE_HEADER};
use linkmarket::server::build_router;

enum As<'a> {
    Anonymous,
    User(&'a str),
    Admin,
}

async fn call(app: &Router, method: &str, uri: &str, who: As<'_>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    match who {
        As::Anonymous => {}
        As::User(id) => builder = builder.header(USER_ID_HEADER, id),
        As::Admin => {
            builder = builder
                .header(USER_ID_HEADER, "ops")
                .header(USER_ROLE_HEADER, "admin")
        }
    }

    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn app() -> Router {
    build_router(common::server_state().await)
}

/// 가입 후 잔고가 필요하면 입금으로 채움
async fn register(app: &Router, username: &str, balance: f64) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/api/users",
        As::Anonymous,
        Some(json!({ "username": username })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let id = body["id"].as_str().unwrap().to_string();

    if balance > 0.0 {
        let (status, body) = call(
            app,
            "POST",
            "/api/billing/deposit",
            As::User(&id),
            Some(json!({ "amount": balance })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
    }
    id
}

#[tokio::test]
async fn test_registration_starts_with_empty_balance() {
    let app = app().await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/users",
        As::Anonymous,
        Some(json!({ "username": "minter", "initialBalance": 1000000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], json!(0.0));
    let user = body["id"].as_str().unwrap().to_string();

    let (_, balance) = call(&app, "GET", "/api/billing/balance", As::User(&user), None).await;
    assert_eq!(balance["balance"], json!(0.0));

    let (_, rows) = call(&app, "GET", "/api/billing/transactions", As::User(&user), None).await;
    assert!(rows.as_array().unwrap().is_empty());

    let (_, body) = call(&app, "GET", "/api/billing/reconcile", As::User(&user), None).await;
    assert_eq!(body["consistent"], json!(true));
}

#[tokio::test]
async fn test_oversized_deposit_is_rejected() {
    let app = app().await;
    let user = register(&app, "whale", 0.0).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/billing/deposit",
        As::User(&user),
        Some(json!({ "amount": 1e28 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_AMOUNT");

    let (_, balance) = call(&app, "GET", "/api/billing/balance", As::User(&user), None).await;
    assert_eq!(balance["balance"], json!(0.0));
}

#[tokio::test]
async fn test_balance_requires_user_header() {
    let app = app().await;
    let user = register(&app, "alice", 10.0).await;

    let (status, body) = call(&app, "GET", "/api/billing/balance", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHENTICATED");

    let (status, body) = call(&app, "GET", "/api/billing/balance", As::User(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], json!(10.0));
    assert_eq!(body["discountTier"], "Standard");
    assert_eq!(body["nextTier"], "Bronze");
}

#[tokio::test]
async fn test_deposit_and_transactions() {
    let app = app().await;
    let user = register(&app, "bob", 0.0).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/billing/deposit",
        As::User(&user),
        Some(json!({ "amount": "120.50" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["newBalance"], json!(120.5));

    let (status, body) = call(&app, "GET", "/api/billing/transactions?limit=10", As::User(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["type"], "deposit");

    let (status, body) = call(
        &app,
        "POST",
        "/api/billing/deposit",
        As::User(&user),
        Some(json!({ "amount": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_AMOUNT");

    let (_, body) = call(&app, "GET", "/api/billing/reconcile", As::User(&user), None).await;
    assert_eq!(body["consistent"], json!(true));
}

#[tokio::test]
async fn test_discount_tiers_and_pricing() {
    let app = app().await;
    let user = register(&app, "carol", 0.0).await;

    let (status, body) = call(&app, "GET", "/api/billing/discount-tiers", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    let tiers = body.as_array().unwrap();
    assert_eq!(tiers.len(), 6);
    assert_eq!(tiers[0]["name"], "Standard");
    assert_eq!(tiers[1]["discountPercentage"], json!(10.0));

    let (status, body) = call(&app, "GET", "/api/billing/pricing?basePrice=100", As::User(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["finalPrice"], json!(100.0));
    assert_eq!(body["isRenewal"], json!(false));
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = app().await;
    let user = register(&app, "dave", 0.0).await;

    let site = json!({
        "siteUrl": "blog.example.com",
        "priceLink": 25,
        "priceArticle": 60,
        "maxLinks": 10,
        "maxArticles": 5
    });

    let (status, body) = call(&app, "POST", "/api/sites", As::User(&user), Some(site.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let (status, body) = call(&app, "POST", "/api/sites", As::Admin, Some(site)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "blog.example.com");
    assert_eq!(body["available"], json!(true));
}

#[tokio::test]
async fn test_purchase_cancel_and_batch_delete_flow() {
    let app = app().await;
    let user = register(&app, "erin", 100.0).await;

    let (_, site) = call(
        &app,
        "POST",
        "/api/sites",
        As::Admin,
        Some(json!({
            "siteUrl": "news.example.com",
            "priceLink": 25,
            "priceArticle": 60,
            "maxLinks": 10,
            "maxArticles": 5
        })),
    )
    .await;
    let site_id = site["id"].as_str().unwrap().to_string();

    let (status, project) = call(
        &app,
        "POST",
        "/api/projects",
        As::User(&user),
        Some(json!({ "name": "launch" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let project_id = project["id"].as_str().unwrap().to_string();

    let mut content_ids = Vec::new();
    for i in 0..3 {
        let (status, link) = call(
            &app,
            "POST",
            &format!("/api/projects/{}/links", project_id),
            As::User(&user),
            Some(json!({ "anchorText": format!("anchor {}", i), "url": format!("https://example.com/{}", i) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        content_ids.push(link["id"].as_str().unwrap().to_string());
    }

    let (status, purchase) = call(
        &app,
        "POST",
        "/api/placements/purchase",
        As::User(&user),
        Some(json!({
            "projectId": project_id,
            "siteId": site_id,
            "type": "link",
            "contentIds": content_ids
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", purchase);
    assert_eq!(purchase["totalCharged"], json!(75.0));
    assert_eq!(purchase["newBalance"], json!(25.0));
    let ids: Vec<String> = purchase["placementIds"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert_eq!(purchase["placements"][0]["status"], "placed");

    // 다른 사용자는 조회 불가
    let stranger = register(&app, "mallory", 0.0).await;
    let (status, _) = call(&app, "GET", &format!("/api/placements/{}", ids[0]), As::User(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, refund) = call(&app, "DELETE", &format!("/api/placements/{}", ids[0]), As::User(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refund["refunded"], json!(25.0));
    assert_eq!(refund["placement"]["status"], "cancelled");

    let (status, body) = call(&app, "DELETE", &format!("/api/placements/{}", ids[0]), As::User(&user), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "INVALID_TRANSITION");

    let (status, batch) = call(
        &app,
        "POST",
        "/api/placements/batch-delete",
        As::User(&user),
        Some(json!({ "placementIds": [ids[1], "missing", ids[2]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch["successful"], json!(2));
    assert_eq!(batch["failed"], json!(1));
    assert_eq!(batch["totalAmount"], json!(50.0));

    let (_, balance) = call(&app, "GET", "/api/billing/balance", As::User(&user), None).await;
    assert_eq!(balance["balance"], json!(100.0));
    assert_eq!(balance["totalSpent"], json!(75.0));

    let (status, listed) = call(&app, "GET", "/api/placements?status=cancelled", As::User(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_purchase_errors_are_mapped() {
    let app = app().await;
    let user = register(&app, "frank", 10.0).await;

    let (_, site) = call(
        &app,
        "POST",
        "/api/sites",
        As::Admin,
        Some(json!({
            "siteUrl": "shop.example.com",
            "priceLink": 25,
            "priceArticle": 60,
            "maxLinks": 10,
            "maxArticles": 5
        })),
    )
    .await;
    let (_, project) = call(&app, "POST", "/api/projects", As::User(&user), Some(json!({ "name": "p" }))).await;
    let project_id = project["id"].as_str().unwrap();
    let (_, link) = call(
        &app,
        "POST",
        &format!("/api/projects/{}/links", project_id),
        As::User(&user),
        Some(json!({ "anchorText": "a", "url": "https://example.com" })),
    )
    .await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/placements/purchase",
        As::User(&user),
        Some(json!({
            "projectId": project_id,
            "siteId": site["id"],
            "type": "link",
            "contentIds": [link["id"]]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INSUFFICIENT_FUNDS");

    let (status, body) = call(&app, "GET", "/api/placements/unknown", As::User(&user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_admin_sweep_and_tier_replacement() {
    let app = app().await;

    let (status, report) = call(&app, "POST", "/api/admin/sweep", As::Admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["expired"], json!(0));

    let (status, tiers) = call(
        &app,
        "PUT",
        "/api/admin/discount-tiers",
        As::Admin,
        Some(json!([
            { "name": "Silver", "minSpent": 500, "discountPercentage": 5 },
            { "name": "Gold", "minSpent": 1000, "discountPercentage": 12.5 }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tiers = tiers.as_array().unwrap();
    assert_eq!(tiers.len(), 3);
    assert_eq!(tiers[0]["name"], "Standard");

    let (status, body) = call(
        &app,
        "PUT",
        "/api/admin/discount-tiers",
        As::Admin,
        Some(json!([
            { "name": "A", "minSpent": 500, "discountPercentage": 20 },
            { "name": "B", "minSpent": 1000, "discountPercentage": 10 }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION_ERROR");
}
