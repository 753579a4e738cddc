//! Ledger append, balance projection, and reconciliation tests.

mod common;

use patronage::bus::{DomainEvent, EventBus};
use patronage::domain::TransactionKind;
use patronage::interfaces::AppendRequest;
use patronage::ledger::Ledger;
use patronage::LoyaltyError;
use uuid::Uuid;

#[tokio::test]
async fn balance_is_the_signed_sum_of_appends() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .award_single(account.id, 300, "spring promotion")
        .await
        .unwrap();
    fx.loyalty
        .award_single(account.id, 150, "review bonus")
        .await
        .unwrap();
    fx.loyalty.redeem(account.id, 100, None).await.unwrap();

    let balance = fx.loyalty.get_balance(account.id).await.unwrap();
    assert_eq!(balance.total_points, 350);
    // Lifetime counts credits only; the redemption does not reduce it.
    assert_eq!(balance.lifetime_points, 450);
}

#[tokio::test]
async fn redeem_beyond_balance_is_rejected_and_writes_nothing() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    fx.loyalty
        .award_single(account.id, 100, "signup gift")
        .await
        .unwrap();

    let err = fx.loyalty.redeem(account.id, 150, None).await.unwrap_err();
    assert!(matches!(
        err,
        LoyaltyError::InsufficientBalance {
            available: 100,
            requested: 150,
        }
    ));

    let balance = fx.loyalty.get_balance(account.id).await.unwrap();
    assert_eq!(balance.total_points, 100);
    let history = fx.loyalty.get_history(account.id, 10, None).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn zero_delta_and_missing_reason_are_rejected() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    let err = fx
        .loyalty
        .award_single(account.id, 0, "nothing")
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::Validation(_)));

    let err = fx.loyalty.award_single(account.id, 50, "  ").await.unwrap_err();
    assert!(matches!(err, LoyaltyError::Validation(_)));

    assert!(fx
        .loyalty
        .get_history(account.id, 10, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_account_is_distinguishable_from_empty_history() {
    let fx = common::fixture().await;

    let err = fx
        .loyalty
        .get_history(Uuid::new_v4(), 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::UnknownAccount(_)));

    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let history = fx.loyalty.get_history(account.id, 10, None).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn history_pages_backwards_through_the_cursor() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    for i in 1..=5 {
        fx.loyalty
            .award_single(account.id, i * 10, "drip grant")
            .await
            .unwrap();
    }

    let page1 = fx.loyalty.get_history(account.id, 2, None).await.unwrap();
    assert_eq!(page1.len(), 2);
    assert!(page1[0].id > page1[1].id);

    let cursor = page1.last().map(|tx| tx.id);
    let page2 = fx.loyalty.get_history(account.id, 2, cursor).await.unwrap();
    assert_eq!(page2.len(), 2);
    assert!(page2[0].id < page1[1].id);

    let cursor = page2.last().map(|tx| tx.id);
    let page3 = fx.loyalty.get_history(account.id, 2, cursor).await.unwrap();
    assert_eq!(page3.len(), 1);

    let points: Vec<i64> = page1
        .iter()
        .chain(&page2)
        .chain(&page3)
        .map(|tx| tx.points)
        .collect();
    assert_eq!(points, vec![50, 40, 30, 20, 10]);
}

#[tokio::test]
async fn every_entry_carries_its_balance_snapshot() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .award_single(account.id, 200, "first grant")
        .await
        .unwrap();
    fx.loyalty.redeem(account.id, 80, None).await.unwrap();
    fx.loyalty
        .award_single(account.id, 30, "second grant")
        .await
        .unwrap();

    let history = fx.loyalty.get_history(account.id, 10, None).await.unwrap();
    let snapshots: Vec<i64> = history.iter().rev().map(|tx| tx.balance_after).collect();
    assert_eq!(snapshots, vec![200, 120, 150]);
}

#[tokio::test]
async fn expiration_downgrades_the_tier_when_lifetime_drops() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .award_single(account.id, 600, "anniversary grant")
        .await
        .unwrap();
    let balance = fx.loyalty.get_balance(account.id).await.unwrap();
    assert_eq!(balance.lifetime_points, 600);

    let tiers = fx.loyalty.get_tiers(fx.program_id).await.unwrap();
    let tier_named = |name: &str| tiers.iter().find(|t| t.name == name).unwrap().id;
    assert_eq!(balance.tier_id, Some(tier_named("Silver")));

    // Expiration is the one debit that reduces lifetime points, so it
    // can move an account back below a threshold it already crossed.
    let stores = common::stores_on(&fx.pool).await;
    let bus = EventBus::new(8);
    let mut events = bus.subscribe();
    let ledger = Ledger::new(stores.ledger, stores.catalog, bus.clone());
    ledger
        .append(AppendRequest::new(account.id, -200, TransactionKind::Expire))
        .await
        .unwrap();

    let balance = fx.loyalty.get_balance(account.id).await.unwrap();
    assert_eq!(balance.total_points, 400);
    assert_eq!(balance.lifetime_points, 400);
    assert_eq!(balance.tier_id, Some(tier_named("Bronze")));

    let mut downgrade = None;
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::TierChanged {
            current_tier_id,
            tier_name,
            ..
        } = event
        {
            downgrade = Some((current_tier_id, tier_name));
        }
    }
    assert_eq!(
        downgrade,
        Some((tier_named("Bronze"), "Bronze".to_string()))
    );
}

#[tokio::test]
async fn reconcile_reports_clean_accounts_as_consistent() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .award_single(account.id, 500, "launch promotion")
        .await
        .unwrap();
    fx.loyalty.redeem(account.id, 200, None).await.unwrap();

    let report = fx.loyalty.reconcile(account.id).await.unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.entries, 2);
    assert_eq!(report.computed_total_points, 300);
    assert_eq!(report.computed_lifetime_points, 500);
    assert!(report.into_result().is_ok());
}

#[tokio::test]
async fn reconcile_surfaces_projection_drift() {
    let fx = common::fixture().await;
    let account = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    fx.loyalty
        .award_single(account.id, 400, "launch promotion")
        .await
        .unwrap();

    // Corrupt the projection behind the ledger's back.
    sqlx::query("UPDATE accounts SET total_points = 999 WHERE id = ?")
        .bind(account.id.to_string())
        .execute(&fx.pool)
        .await
        .unwrap();

    let report = fx.loyalty.reconcile(account.id).await.unwrap();
    assert!(!report.is_consistent());
    assert_eq!(report.stored_total_points, 999);
    assert_eq!(report.computed_total_points, 400);
    assert!(matches!(
        report.into_result(),
        Err(LoyaltyError::Consistency(_))
    ));
}
