//! Referral reward coordinator.
//!
//! Drives the `Pending -> Completed -> Rewarded` lifecycle, with
//! `Expired` reachable from `Pending` only. The reward transition is
//! idempotent: payouts are gated by the write-once per-side flags, and
//! a retried trigger on an already-rewarded record is a no-op.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::{DomainEvent, EventBus};
use crate::domain::{ReferralProgram, ReferralRecord, ReferralStatus, TransactionKind};
use crate::error::{LoyaltyError, Result};
use crate::interfaces::{AppendRequest, CatalogStore, LedgerStore, ReferralStore};
use crate::ledger::Ledger;

/// Outcome of a reward attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardOutcome {
    /// Both sides paid out in this call (or the remaining side was).
    Rewarded,
    /// Record was already rewarded; nothing appended.
    AlreadyRewarded,
}

/// Coordinates referral records with the ledger.
pub struct ReferralCoordinator {
    store: Arc<dyn ReferralStore>,
    accounts: Arc<dyn LedgerStore>,
    catalog: Arc<dyn CatalogStore>,
    ledger: Arc<Ledger>,
    bus: EventBus,
}

impl ReferralCoordinator {
    pub fn new(
        store: Arc<dyn ReferralStore>,
        accounts: Arc<dyn LedgerStore>,
        catalog: Arc<dyn CatalogStore>,
        ledger: Arc<Ledger>,
        bus: EventBus,
    ) -> Self {
        Self {
            store,
            accounts,
            catalog,
            ledger,
            bus,
        }
    }

    /// Record a new referral: the referee enters the referrer's code.
    ///
    /// Rejected when the code is unknown, the referee is the referrer,
    /// the referee was already referred, or the referrer's settled
    /// (completed + rewarded) count reached the program cap.
    pub async fn apply_referral(&self, code: &str, referee_account_id: Uuid) -> Result<ReferralRecord> {
        let referrer = self
            .accounts
            .account_by_referral_code(code)
            .await?
            .ok_or_else(|| LoyaltyError::UnknownReferralCode(code.to_string()))?;

        if referrer.id == referee_account_id {
            return Err(LoyaltyError::Validation(
                "customers cannot refer themselves".to_string(),
            ));
        }

        let referee = self
            .accounts
            .account(referee_account_id)
            .await?
            .ok_or(LoyaltyError::UnknownAccount(referee_account_id))?;
        if !referee.is_active {
            return Err(LoyaltyError::InactiveAccount(referee.id));
        }

        if self.store.referee_already_referred(referee.id).await? {
            return Err(LoyaltyError::Validation(
                "customer was already referred".to_string(),
            ));
        }

        let program = self.program_for_account_store(&referrer).await?;
        let settled = self.store.settled_count(referrer.id).await?;
        if settled >= program.max_referrals_per_customer {
            return Err(LoyaltyError::ReferralCapReached {
                referrer: referrer.id,
                cap: program.max_referrals_per_customer,
            });
        }

        let record = ReferralRecord {
            id: Uuid::new_v4(),
            code: code.to_string(),
            referrer_account_id: referrer.id,
            referee_account_id: Some(referee.id),
            status: ReferralStatus::Pending,
            referrer_rewarded: false,
            referee_rewarded: false,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.store.create(&record).await?;

        info!(referral = %record.id, referrer = %referrer.id, referee = %referee.id, "referral applied");
        Ok(record)
    }

    /// Order-completion hook: a qualifying referee order completes the
    /// pending referral and triggers the reward payout.
    pub async fn order_completed(
        &self,
        referee_account_id: Uuid,
        order_total_cents: i64,
    ) -> Result<Option<RewardOutcome>> {
        let Some(record) = self.store.pending_for_referee(referee_account_id).await? else {
            return Ok(None);
        };

        let referrer = self
            .accounts
            .account(record.referrer_account_id)
            .await?
            .ok_or(LoyaltyError::UnknownAccount(record.referrer_account_id))?;
        let program = self.program_for_account_store(&referrer).await?;

        if order_total_cents < program.min_order_value_cents {
            debug!(
                referral = %record.id,
                total = order_total_cents,
                required = program.min_order_value_cents,
                "order below referral qualification threshold"
            );
            return Ok(None);
        }

        // Compare-and-set: a racing duplicate trigger loses here and
        // falls through to the idempotent reward path.
        if self.store.complete(record.id, Utc::now()).await? {
            info!(referral = %record.id, "referral completed");
        }

        self.reward(record.id).await.map(Some)
    }

    /// `Completed -> Rewarded`: issue both ledger appends, each gated by
    /// its write-once flag. Safe to retry; a record already rewarded
    /// produces zero additional ledger entries.
    ///
    /// Each side's flag is claimed (compare-and-set) before its append,
    /// so two racing retries split the claims instead of both paying.
    pub async fn reward(&self, referral_id: Uuid) -> Result<RewardOutcome> {
        let record = self
            .store
            .get(referral_id)
            .await?
            .ok_or(LoyaltyError::UnknownReferral(referral_id))?;

        match record.status {
            ReferralStatus::Rewarded => return Ok(RewardOutcome::AlreadyRewarded),
            ReferralStatus::Completed => {}
            status => {
                return Err(LoyaltyError::InvalidReferralState {
                    id: referral_id,
                    status,
                })
            }
        }

        let referrer = self
            .accounts
            .account(record.referrer_account_id)
            .await?
            .ok_or(LoyaltyError::UnknownAccount(record.referrer_account_id))?;
        let program = self.program_for_account_store(&referrer).await?;

        if program.referrer_reward_points > 0
            && self.store.mark_referrer_rewarded(record.id).await?
        {
            self.ledger
                .append(
                    AppendRequest::new(
                        record.referrer_account_id,
                        program.referrer_reward_points,
                        TransactionKind::Bonus,
                    )
                    .with_reason("referral reward"),
                )
                .await?;
        }

        if let Some(referee_id) = record.referee_account_id {
            if program.referee_reward_points > 0
                && self.store.mark_referee_rewarded(record.id).await?
            {
                self.ledger
                    .append(
                        AppendRequest::new(
                            referee_id,
                            program.referee_reward_points,
                            TransactionKind::Bonus,
                        )
                        .with_reason("referral welcome reward"),
                    )
                    .await?;
            }
        }

        // Whoever wins the status flip owns the event; losers report the
        // record as already rewarded.
        if !self.store.mark_rewarded(record.id).await? {
            return Ok(RewardOutcome::AlreadyRewarded);
        }

        if let Some(referee_id) = record.referee_account_id {
            self.bus.publish(DomainEvent::ReferralRewarded {
                referral_id: record.id,
                referrer_account_id: record.referrer_account_id,
                referee_account_id: referee_id,
            });
        }

        info!(referral = %record.id, "referral rewarded");
        Ok(RewardOutcome::Rewarded)
    }

    /// Expire pending referrals older than the program TTL. Expired
    /// referrals never transition further.
    pub async fn expire_pending(&self, store_id: Uuid) -> Result<u64> {
        let program = self
            .catalog
            .referral_program_for_store(store_id)
            .await?
            .ok_or(LoyaltyError::NoProgramForStore(store_id))?;

        let cutoff = Utc::now() - Duration::days(program.ttl_days);
        let expired = self.store.expire_pending(cutoff).await?;
        if expired > 0 {
            info!(store = %store_id, expired, "expired pending referrals");
        }
        Ok(expired)
    }

    /// Referral configuration for the store that owns the referrer's
    /// loyalty program.
    async fn program_for_account_store(
        &self,
        account: &crate::domain::LoyaltyAccount,
    ) -> Result<ReferralProgram> {
        let loyalty_program = self
            .catalog
            .program(account.program_id)
            .await?
            .ok_or(LoyaltyError::UnknownProgram(account.program_id))?;

        self.catalog
            .referral_program_for_store(loyalty_program.store_id)
            .await?
            .ok_or(LoyaltyError::NoProgramForStore(loyalty_program.store_id))
    }
}
