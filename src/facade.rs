//! Loyalty facade for in-process library usage.
//!
//! Wires configuration, stores, and services into one entry point for
//! UI/admin collaborators. All reads return immutable snapshots; the
//! ledger behind the facade stays the system of record.
//!
//! # Example
//!
//! ```ignore
//! use patronage::config::Config;
//! use patronage::facade::Loyalty;
//!
//! let loyalty = Loyalty::open(Config::default()).await?;
//!
//! let account = loyalty.enroll(customer_id, program_id).await?;
//! loyalty.award_single(account.id, 500, "launch promotion").await?;
//! let balance = loyalty.get_balance(account.id).await?;
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::awards::{AwardService, BulkAwardReport};
use crate::bus::{DomainEvent, EventBus};
use crate::config::Config;
use crate::domain::{
    BalanceSummary, LoyaltyAccount, LoyaltyProgram, LoyaltyTier, LoyaltyTransaction,
    OrderCompletion, ReferralProgram, ReferralRecord, TierBucket,
};
use crate::error::{LoyaltyError, Result};
use crate::interfaces::{CatalogStore, OrderSource};
use crate::ledger::{DriftReport, Ledger};
use crate::referrals::{ReferralCoordinator, RewardOutcome};
use crate::storage::Stores;
use crate::tracking::OrderTracker;

/// Embedded loyalty core.
pub struct Loyalty {
    config: Config,
    bus: EventBus,
    ledger: Arc<Ledger>,
    awards: AwardService,
    referrals: ReferralCoordinator,
    catalog: Arc<dyn CatalogStore>,
    order_source: Option<Arc<dyn OrderSource>>,
}

impl Loyalty {
    /// Open against configured storage.
    #[cfg(feature = "sqlite")]
    pub async fn open(config: Config) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let stores = crate::storage::init_storage(&config.storage).await?;
        Ok(Self::with_stores(config, stores))
    }

    /// Wire against caller-provided stores (tests, custom backends).
    pub fn with_stores(config: Config, stores: Stores) -> Self {
        let bus = EventBus::new(config.events.capacity);
        let ledger = Arc::new(Ledger::new(
            stores.ledger.clone(),
            stores.catalog.clone(),
            bus.clone(),
        ));
        let awards = AwardService::new(ledger.clone(), stores.ledger.clone(), stores.catalog.clone());
        let referrals = ReferralCoordinator::new(
            stores.referrals.clone(),
            stores.ledger.clone(),
            stores.catalog.clone(),
            ledger.clone(),
            bus.clone(),
        );

        Self {
            config,
            bus,
            ledger,
            awards,
            referrals,
            catalog: stores.catalog,
            order_source: None,
        }
    }

    /// Attach the order-fulfillment collaborator for tracking.
    pub fn with_order_source(mut self, source: Arc<dyn OrderSource>) -> Self {
        self.order_source = Some(source);
        self
    }

    // ------------------------------------------------------------------
    // Accounts and balances
    // ------------------------------------------------------------------

    /// Enroll a customer into a program (welcome bonus included when
    /// configured).
    pub async fn enroll(&self, customer_id: Uuid, program_id: Uuid) -> Result<LoyaltyAccount> {
        self.awards.enroll(customer_id, program_id).await
    }

    /// Projected balance; never scans the ledger.
    pub async fn get_balance(&self, account_id: Uuid) -> Result<BalanceSummary> {
        self.ledger.balance(account_id).await
    }

    /// Reverse-chronological ledger history, cursor-paginated.
    pub async fn get_history(
        &self,
        account_id: Uuid,
        limit: u32,
        cursor: Option<i64>,
    ) -> Result<Vec<LoyaltyTransaction>> {
        self.ledger.history(account_id, limit, cursor).await
    }

    /// Fold full history against the stored projection; drift is
    /// reported, not corrected.
    pub async fn reconcile(&self, account_id: Uuid) -> Result<DriftReport> {
        self.ledger.reconcile(account_id).await
    }

    /// Spend points (coupon redemption). Rejected with
    /// `InsufficientBalance` when the account holds fewer points.
    pub async fn redeem(
        &self,
        account_id: Uuid,
        points: i64,
        order_id: Option<Uuid>,
    ) -> Result<LoyaltyTransaction> {
        let outcome = self.ledger.redeem(account_id, points, order_id).await?;
        Ok(outcome.transaction)
    }

    // ------------------------------------------------------------------
    // Awards
    // ------------------------------------------------------------------

    pub async fn award_single(
        &self,
        account_id: Uuid,
        points: i64,
        reason: &str,
    ) -> Result<LoyaltyTransaction> {
        self.awards.award_single(account_id, points, reason).await
    }

    pub async fn award_bulk(
        &self,
        account_ids: &[Uuid],
        points: i64,
        reason: &str,
        idempotency_key: Option<&str>,
    ) -> Result<BulkAwardReport> {
        self.awards
            .award_bulk(account_ids, points, reason, idempotency_key)
            .await
    }

    /// Order-completion intake: earn points, bump order counters, then
    /// drive any pending referral for the purchaser. Referral completion
    /// depends only on the order total, not on whether points were
    /// earned.
    pub async fn order_completed(&self, completion: &OrderCompletion) -> Result<()> {
        let outcome = self.awards.order_completed(completion).await?;

        self.referrals
            .order_completed(outcome.account.id, completion.order_total_cents)
            .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub async fn get_tiers(&self, program_id: Uuid) -> Result<Vec<LoyaltyTier>> {
        self.catalog.tiers(program_id).await
    }

    /// Server-computed accounts-per-tier aggregate.
    pub async fn get_tier_distribution(&self, program_id: Uuid) -> Result<Vec<TierBucket>> {
        self.catalog.tier_distribution(program_id).await
    }

    pub async fn put_program(&self, program: &LoyaltyProgram) -> Result<()> {
        self.catalog.upsert_program(program).await
    }

    pub async fn add_tier(&self, tier: &LoyaltyTier) -> Result<()> {
        self.catalog.add_tier(tier).await
    }

    pub async fn put_referral_program(&self, program: &ReferralProgram) -> Result<()> {
        self.catalog.upsert_referral_program(program).await
    }

    // ------------------------------------------------------------------
    // Referrals
    // ------------------------------------------------------------------

    pub async fn get_referral_program(&self, store_id: Uuid) -> Result<Option<ReferralProgram>> {
        self.catalog.referral_program_for_store(store_id).await
    }

    pub async fn apply_referral(
        &self,
        code: &str,
        referee_account_id: Uuid,
    ) -> Result<ReferralRecord> {
        self.referrals.apply_referral(code, referee_account_id).await
    }

    /// Idempotent reward payout for a completed referral.
    pub async fn reward_referral(&self, referral_id: Uuid) -> Result<RewardOutcome> {
        self.referrals.reward(referral_id).await
    }

    /// Expire pending referrals past the store's TTL.
    pub async fn expire_referrals(&self, store_id: Uuid) -> Result<u64> {
        self.referrals.expire_pending(store_id).await
    }

    // ------------------------------------------------------------------
    // Order tracking
    // ------------------------------------------------------------------

    /// Start the dual-transport synchronizer for one order.
    pub fn track_order(&self, order_id: Uuid) -> Result<OrderTracker> {
        let source = self.order_source.clone().ok_or_else(|| {
            LoyaltyError::Validation("no order source configured".to_string())
        })?;
        Ok(OrderTracker::spawn(
            source,
            order_id,
            self.config.tracking.clone(),
        ))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Subscribe to committed domain events (read-only notification).
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<DomainEvent> {
        self.bus.subscribe()
    }
}
