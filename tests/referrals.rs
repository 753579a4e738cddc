//! Referral lifecycle tests: application, completion, idempotent
//! rewards, caps, and expiry.

mod common;

use patronage::domain::{
    LoyaltyProgram, OrderCompletion, ReferralProgram, ReferralStatus, TransactionKind,
};
use patronage::referrals::RewardOutcome;
use patronage::LoyaltyError;
use uuid::Uuid;

async fn qualifying_order(fx: &common::Fixture, account_id: Uuid, total_cents: i64) {
    fx.loyalty
        .order_completed(&OrderCompletion {
            account_id: Some(account_id),
            customer_id: None,
            order_id: Uuid::new_v4(),
            order_total_cents: total_cents,
        })
        .await
        .unwrap();
}

async fn reward_entries(fx: &common::Fixture, account_id: Uuid, reason: &str) -> usize {
    fx.loyalty
        .get_history(account_id, 50, None)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Bonus && tx.reason.as_deref() == Some(reason))
        .count()
}

#[tokio::test]
async fn applying_a_referral_creates_a_pending_record() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    let record = fx
        .loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();

    assert_eq!(record.status, ReferralStatus::Pending);
    assert_eq!(record.referrer_account_id, referrer.id);
    assert_eq!(record.referee_account_id, Some(referee.id));
    assert!(!record.referrer_rewarded);
    assert!(!record.referee_rewarded);
}

#[tokio::test]
async fn unknown_code_and_self_referral_are_rejected() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    let err = fx
        .loyalty
        .apply_referral("REF-NOSUCH00", referrer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::UnknownReferralCode(_)));

    let err = fx
        .loyalty
        .apply_referral(&referrer.referral_code, referrer.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::Validation(_)));
}

#[tokio::test]
async fn a_referee_can_only_be_referred_once() {
    let fx = common::fixture().await;
    let first = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let second = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .apply_referral(&first.referral_code, referee.id)
        .await
        .unwrap();

    let err = fx
        .loyalty
        .apply_referral(&second.referral_code, referee.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LoyaltyError::Validation(_)));
}

#[tokio::test]
async fn qualifying_order_completes_and_rewards_both_sides() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();
    qualifying_order(&fx, referee.id, 1500).await;

    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 1);
    assert_eq!(
        reward_entries(&fx, referee.id, "referral welcome reward").await,
        1
    );

    let referrer_balance = fx.loyalty.get_balance(referrer.id).await.unwrap();
    assert_eq!(referrer_balance.total_points, 200);

    // The referee also earned order points: $15.00 at 2 pts/dollar.
    let referee_balance = fx.loyalty.get_balance(referee.id).await.unwrap();
    assert_eq!(referee_balance.total_points, 100 + 30);
}

#[tokio::test]
async fn referral_completes_even_when_the_order_earns_nothing() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();

    // Earning stops with the program, referral completion must not: it
    // depends only on the order total.
    fx.loyalty
        .put_program(&LoyaltyProgram {
            id: fx.program_id,
            store_id: fx.store_id,
            points_per_dollar: 2,
            welcome_bonus_points: 0,
            referral_bonus_points: 0,
            is_active: false,
        })
        .await
        .unwrap();

    qualifying_order(&fx, referee.id, 2000).await;

    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 1);
    assert_eq!(
        reward_entries(&fx, referee.id, "referral welcome reward").await,
        1
    );

    // No earn entry accompanied the order.
    let earns = fx
        .loyalty
        .get_history(referee.id, 50, None)
        .await
        .unwrap()
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Earn)
        .count();
    assert_eq!(earns, 0);
}

#[tokio::test]
async fn concurrent_reward_retries_pay_each_side_once() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    let record = fx
        .loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();

    // Move the record to completed without triggering the payout hook,
    // as if completion was recorded but the payout never ran.
    sqlx::query("UPDATE referrals SET status = 'completed' WHERE id = ?")
        .bind(record.id.to_string())
        .execute(&fx.pool)
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        fx.loyalty.reward_referral(record.id),
        fx.loyalty.reward_referral(record.id)
    );

    let outcomes = [a.unwrap(), b.unwrap()];
    let winners = outcomes
        .iter()
        .filter(|o| **o == RewardOutcome::Rewarded)
        .count();
    assert_eq!(winners, 1);

    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 1);
    assert_eq!(
        reward_entries(&fx, referee.id, "referral welcome reward").await,
        1
    );
}

#[tokio::test]
async fn order_below_threshold_leaves_the_referral_pending() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    fx.loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();
    qualifying_order(&fx, referee.id, 500).await;

    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 0);

    // Still pending, so a later qualifying order can complete it.
    qualifying_order(&fx, referee.id, 1200).await;
    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 1);
}

#[tokio::test]
async fn duplicate_completion_trigger_rewards_exactly_once() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    let record = fx
        .loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();

    // A redelivered completion event must not pay out twice.
    qualifying_order(&fx, referee.id, 2000).await;
    qualifying_order(&fx, referee.id, 2000).await;

    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 1);
    assert_eq!(
        reward_entries(&fx, referee.id, "referral welcome reward").await,
        1
    );

    // And a direct retry on the record is an explicit no-op.
    let outcome = fx.loyalty.reward_referral(record.id).await.unwrap();
    assert_eq!(outcome, RewardOutcome::AlreadyRewarded);
    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 1);
}

#[tokio::test]
async fn rewarding_a_pending_referral_is_an_invalid_transition() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    let record = fx
        .loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();

    let err = fx.loyalty.reward_referral(record.id).await.unwrap_err();
    assert!(matches!(
        err,
        LoyaltyError::InvalidReferralState {
            status: ReferralStatus::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn settled_referrals_count_against_the_cap() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    // Cap is 2; pending referrals do not count, settled ones do.
    for _ in 0..2 {
        let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
        fx.loyalty
            .apply_referral(&referrer.referral_code, referee.id)
            .await
            .unwrap();
        qualifying_order(&fx, referee.id, 1500).await;
    }

    let third = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let err = fx
        .loyalty
        .apply_referral(&referrer.referral_code, third.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LoyaltyError::ReferralCapReached { cap: 2, .. }
    ));
}

#[tokio::test]
async fn expired_referrals_are_terminal() {
    let fx = common::fixture().await;
    let referrer = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();
    let referee = fx.loyalty.enroll(Uuid::new_v4(), fx.program_id).await.unwrap();

    let record = fx
        .loyalty
        .apply_referral(&referrer.referral_code, referee.id)
        .await
        .unwrap();

    // Zero-day TTL expires anything created before this call.
    fx.loyalty
        .put_referral_program(&ReferralProgram {
            id: fx.referral_program_id,
            store_id: fx.store_id,
            min_order_value_cents: 1000,
            referrer_reward_points: 200,
            referee_reward_points: 100,
            max_referrals_per_customer: 2,
            ttl_days: 0,
            is_active: true,
        })
        .await
        .unwrap();
    let expired = fx.loyalty.expire_referrals(fx.store_id).await.unwrap();
    assert_eq!(expired, 1);

    // A qualifying order after expiry finds nothing to complete.
    qualifying_order(&fx, referee.id, 2000).await;
    assert_eq!(reward_entries(&fx, referrer.id, "referral reward").await, 0);

    let err = fx.loyalty.reward_referral(record.id).await.unwrap_err();
    assert!(matches!(
        err,
        LoyaltyError::InvalidReferralState {
            status: ReferralStatus::Expired,
            ..
        }
    ));
}
