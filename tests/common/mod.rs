//! Shared fixtures for integration tests.
//!
//! All tests run against an in-memory SQLite database, no external
//! dependencies required.

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use patronage::config::Config;
use patronage::domain::{LoyaltyProgram, LoyaltyTier, ReferralProgram};
use patronage::facade::Loyalty;
use patronage::storage::{SqliteCatalogStore, SqliteLedgerStore, SqliteReferralStore, Stores};

pub struct Fixture {
    pub loyalty: Loyalty,
    pub pool: SqlitePool,
    pub store_id: Uuid,
    pub program_id: Uuid,
    pub referral_program_id: Uuid,
}

/// A single-connection in-memory pool: every handle sees the same
/// database.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite")
}

pub async fn stores_on(pool: &SqlitePool) -> Stores {
    let ledger = Arc::new(SqliteLedgerStore::new(pool.clone()));
    ledger.init().await.expect("init ledger schema");

    let catalog = Arc::new(SqliteCatalogStore::new(pool.clone()));
    catalog.init().await.expect("init catalog schema");

    let referrals = Arc::new(SqliteReferralStore::new(pool.clone()));
    referrals.init().await.expect("init referral schema");

    Stores {
        ledger,
        catalog,
        referrals,
    }
}

/// Loyalty core over in-memory storage, seeded with:
/// - a program earning 2 points/dollar, no welcome bonus
/// - tiers Bronze (0) / Silver (500) / Gold (2000)
/// - a referral program: $10 qualifying order, 200/100 reward split,
///   cap of 2 referrals, 30 day TTL
pub async fn fixture() -> Fixture {
    let pool = memory_pool().await;
    let stores = stores_on(&pool).await;
    let loyalty = Loyalty::with_stores(Config::default(), stores);

    let store_id = Uuid::new_v4();
    let program_id = Uuid::new_v4();
    let referral_program_id = Uuid::new_v4();

    loyalty
        .put_program(&LoyaltyProgram {
            id: program_id,
            store_id,
            points_per_dollar: 2,
            welcome_bonus_points: 0,
            referral_bonus_points: 0,
            is_active: true,
        })
        .await
        .expect("seed program");

    for (name, min_points) in [("Bronze", 0), ("Silver", 500), ("Gold", 2000)] {
        loyalty
            .add_tier(&tier(program_id, name, min_points))
            .await
            .expect("seed tier");
    }

    loyalty
        .put_referral_program(&ReferralProgram {
            id: referral_program_id,
            store_id,
            min_order_value_cents: 1000,
            referrer_reward_points: 200,
            referee_reward_points: 100,
            max_referrals_per_customer: 2,
            ttl_days: 30,
            is_active: true,
        })
        .await
        .expect("seed referral program");

    Fixture {
        loyalty,
        pool,
        store_id,
        program_id,
        referral_program_id,
    }
}

pub fn tier(program_id: Uuid, name: &str, min_points: i64) -> LoyaltyTier {
    LoyaltyTier {
        id: Uuid::new_v4(),
        program_id,
        name: name.to_string(),
        min_points,
        discount_percentage: 0.0,
        free_delivery: false,
        priority_support: false,
        birthday_reward_points: 0,
        sort_order: min_points,
    }
}
