//! 결제 원장 통합 테스트
//!
//! 원장 정합성, 이중 지출 방지, 추천 보너스 1회 해제, 프로모션, 할인 등급을 검증합니다.

mod common;

use chrono::Utc;
use futures::future::join_all;
use rust_decimal::Decimal;

use common::{money, setup};
use linkmarket::billing::error::BillingError;
use linkmarket::billing::model::TransactionType;
use linkmarket::billing::service::NewPromoCode;
use linkmarket::placement::lifecycle::PurchaseRequest;
use linkmarket::placement::model::{Actor, PlacementType};

#[tokio::test]
async fn test_ledger_reconciles_after_mixed_operations() {
    let env = setup().await;
    let user = env.user("alice", "100").await;
    let site = env.site("blog.example.com", "25", "60", 10).await;
    let project = env.project(&user).await;
    let links = env.links(&user, &project, 2).await;

    env.billing.deposit(&user, money("50"), None).await.unwrap();
    let ids = env
        .buy_links(&user, &project, &site.id, links, false, Utc::now())
        .await;
    env.manager
        .cancel(&Actor::User(user.clone()), &ids[0], Utc::now())
        .await
        .unwrap();

    let result = env.billing.ledger().reconcile(&user).await.unwrap();
    assert!(result.consistent);
    assert_eq!(result.initial_balance, Decimal::ZERO);
    assert_eq!(result.balance, money("125"));
    assert_eq!(result.initial_balance + result.transaction_sum, result.balance);
}

#[tokio::test]
async fn test_concurrent_purchases_do_not_double_spend() {
    let env = setup().await;
    let user = env.user("bob", "25").await;
    let site = env.site("news.example.com", "25", "60", 10).await;
    let project = env.project(&user).await;
    let links = env.links(&user, &project, 5).await;

    let now = Utc::now();
    let requests = links.into_iter().map(|content_id| {
        env.manager.purchase(
            PurchaseRequest {
                user_id: user.clone(),
                project_id: project.clone(),
                site_id: site.id.clone(),
                placement_type: PlacementType::Link,
                content_ids: vec![content_id],
                scheduled_date: None,
                auto_renewal: false,
            },
            now,
        )
    });

    let results = join_all(requests).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| matches!(r, Err(BillingError::InsufficientFunds { .. })))
        .count();
    assert_eq!(succeeded, 1);
    assert_eq!(insufficient, 4);

    let account = env.billing.ledger().account(&user).await.unwrap();
    assert_eq!(account.balance, Decimal::ZERO);
    assert!(env.billing.ledger().reconcile(&user).await.unwrap().consistent);
}

#[tokio::test]
async fn test_purchase_with_insufficient_funds_leaves_no_trace() {
    let env = setup().await;
    let user = env.user("carol", "10").await;
    let site = env.site("shop.example.com", "25", "60", 10).await;
    let project = env.project(&user).await;
    let links = env.links(&user, &project, 1).await;

    let result = env
        .manager
        .purchase(
            PurchaseRequest {
                user_id: user.clone(),
                project_id: project,
                site_id: site.id.clone(),
                placement_type: PlacementType::Link,
                content_ids: links,
                scheduled_date: None,
                auto_renewal: false,
            },
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(BillingError::InsufficientFunds { .. })));
    assert!(env.manager.list(&user, None).await.unwrap().is_empty());
    // 가입 후 입금 1건만 남음
    let rows = env.billing.ledger().transactions(&user, 50, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].transaction_type, TransactionType::Deposit);
    assert_eq!(env.catalog.site(&site.id).await.unwrap().used_links, 0);
}

#[tokio::test]
async fn test_concurrent_deposits_unlock_referral_bonus_once() {
    let env = setup().await;
    let referrer = env
        .billing
        .register_user("referrer", None, Utc::now())
        .await
        .unwrap();
    let invited = env
        .billing
        .register_user("invited", Some(referrer.referral_code.to_lowercase().as_str()), Utc::now())
        .await
        .unwrap();
    assert_eq!(invited.referred_by.as_deref(), Some(referrer.id.as_str()));
    assert_eq!(invited.locked_bonus, money("50"));

    let deposits = (0..2).map(|_| env.billing.deposit(&invited.id, money("100"), None));
    let results = join_all(deposits).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let bonuses: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok().and_then(|receipt| receipt.referral_bonus))
        .collect();
    assert_eq!(bonuses, vec![money("50")]);

    let account = env.billing.ledger().account(&invited.id).await.unwrap();
    assert_eq!(account.balance, money("250"));
    assert!(account.locked_bonus_unlocked);
    assert_eq!(account.locked_bonus, Decimal::ZERO);

    let referral_rows = env
        .billing
        .ledger()
        .transactions(&invited.id, 50, 0)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.transaction_type == TransactionType::Referral)
        .count();
    assert_eq!(referral_rows, 1);
    assert!(env.billing.ledger().reconcile(&invited.id).await.unwrap().consistent);
}

#[tokio::test]
async fn test_deposit_below_threshold_keeps_bonus_locked() {
    let env = setup().await;
    let referrer = env
        .billing
        .register_user("referrer", None, Utc::now())
        .await
        .unwrap();
    let invited = env
        .billing
        .register_user("invited", Some(referrer.referral_code.as_str()), Utc::now())
        .await
        .unwrap();

    let receipt = env.billing.deposit(&invited.id, money("99.99"), None).await.unwrap();
    assert_eq!(receipt.referral_bonus, None);
    assert_eq!(receipt.new_balance, money("99.99"));

    // 이후 기준 이상 입금 시 해제
    assert!(env.billing.referral().on_deposit(&invited.id, money("100")).await.unwrap());
    assert!(!env.billing.referral().on_deposit(&invited.id, money("100")).await.unwrap());

    let account = env.billing.ledger().account(&invited.id).await.unwrap();
    assert_eq!(account.balance, money("149.99"));
}

#[tokio::test]
async fn test_grant_after_unlock_is_rejected() {
    let env = setup().await;
    let user = env.user("dave", "0").await;

    env.billing
        .referral()
        .grant_locked_bonus(&user, money("20"), money("40"))
        .await
        .unwrap();
    env.billing.deposit(&user, money("40"), None).await.unwrap();

    let again = env
        .billing
        .referral()
        .grant_locked_bonus(&user, money("20"), money("40"))
        .await;
    assert!(matches!(again, Err(BillingError::AlreadyUnlocked)));
}

#[tokio::test]
async fn test_non_positive_deposit_event_does_not_unlock() {
    let env = setup().await;
    let user = env.user("gina", "0").await;

    env.billing
        .referral()
        .grant_locked_bonus(&user, money("20"), Decimal::ZERO)
        .await
        .unwrap();

    for amount in ["0", "-5"] {
        let result = env.billing.referral().on_deposit(&user, money(amount)).await;
        assert!(matches!(result, Err(BillingError::InvalidAmount(_))));
    }

    let account = env.billing.ledger().account(&user).await.unwrap();
    assert_eq!(account.balance, Decimal::ZERO);
    assert_eq!(account.locked_bonus, money("20"));
    assert!(!account.locked_bonus_unlocked);

    assert!(env.billing.referral().on_deposit(&user, money("0.01")).await.unwrap());
    assert_eq!(env.billing.ledger().account(&user).await.unwrap().balance, money("20"));
}

#[tokio::test]
async fn test_promo_code_bonus_and_usage_limit() {
    let env = setup().await;
    let user = env.user("erin", "0").await;

    env.billing
        .create_promo_code(
            NewPromoCode {
                code: "welcome10".to_string(),
                bonus_percent: money("10"),
                min_deposit: money("50"),
                max_uses: Some(1),
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let too_small = env.billing.deposit(&user, money("20"), Some("WELCOME10")).await;
    assert!(matches!(too_small, Err(BillingError::Validation(_))));
    // 실패한 입금은 원장에 남지 않음
    assert_eq!(env.billing.ledger().account(&user).await.unwrap().balance, Decimal::ZERO);

    let receipt = env.billing.deposit(&user, money("100"), Some("welcome10")).await.unwrap();
    assert_eq!(receipt.bonus_amount, Some(money("10")));
    assert_eq!(receipt.new_balance, money("110"));

    let exhausted = env.billing.deposit(&user, money("100"), Some("WELCOME10")).await;
    assert!(matches!(exhausted, Err(BillingError::Validation(_))));
    assert!(env.billing.ledger().reconcile(&user).await.unwrap().consistent);
}

#[tokio::test]
async fn test_admin_adjustment_requires_confirmation_below_zero() {
    let env = setup().await;
    let user = env.user("frank", "10").await;
    let ledger = env.billing.ledger();

    let refused = ledger.admin_adjust(&user, money("-15"), "차지백", false).await;
    assert!(matches!(refused, Err(BillingError::InsufficientFunds { .. })));

    let receipt = ledger.admin_adjust(&user, money("-15"), "차지백", true).await.unwrap();
    assert_eq!(receipt.new_balance, money("-5"));
    assert!(ledger.reconcile(&user).await.unwrap().consistent);

    let missing_reason = ledger.admin_adjust(&user, money("5"), "  ", false).await;
    assert!(matches!(missing_reason, Err(BillingError::Validation(_))));
}

#[tokio::test]
async fn test_spend_moves_user_into_discount_tier() {
    let env = setup().await;
    let user = env.user("grace", "1000").await;
    let site = env.site("premium.example.com", "800", "900", 10).await;
    let project = env.project(&user).await;
    let links = env.links(&user, &project, 1).await;

    env.buy_links(&user, &project, &site.id, links, false, Utc::now()).await;

    let summary = env.billing.balance_summary(&user).await.unwrap();
    assert_eq!(summary.total_spent, money("800"));
    assert_eq!(summary.discount_tier, "Bronze");
    assert_eq!(summary.current_discount, money("10"));
    assert_eq!(summary.next_tier.as_deref(), Some("Silver"));
    assert_eq!(summary.balance, money("200"));

    let quote = env.billing.quote(&user, money("100"), false).await.unwrap();
    assert_eq!(quote.final_price, money("90.00"));
}

#[tokio::test]
async fn test_refund_does_not_reduce_total_spent() {
    let env = setup().await;
    let user = env.user("heidi", "1000").await;
    let site = env.site("premium.example.com", "800", "900", 10).await;
    let project = env.project(&user).await;
    let links = env.links(&user, &project, 1).await;

    let ids = env.buy_links(&user, &project, &site.id, links, false, Utc::now()).await;
    env.manager
        .cancel(&Actor::User(user.clone()), &ids[0], Utc::now())
        .await
        .unwrap();

    let summary = env.billing.balance_summary(&user).await.unwrap();
    assert_eq!(summary.balance, money("1000"));
    assert_eq!(summary.total_spent, money("800"));
    assert_eq!(summary.discount_tier, "Bronze");
}
