//! Transaction ledger service.
//!
//! The one write path for loyalty points. Every committed append carries
//! its balance projection with it (inside the store transaction), then
//! re-resolves the account's tier and publishes domain events.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{DomainEvent, EventBus};
use crate::domain::{BalanceSummary, LoyaltyAccount, LoyaltyTransaction};
use crate::error::{LoyaltyError, Result};
use crate::interfaces::{AppendOutcome, AppendRequest, CatalogStore, LedgerStore};
use crate::projection;
use crate::tiers::resolve_tier;

/// Reconciliation outcome: stored projection vs. a fold of full history.
///
/// Drift is reported, never silently corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftReport {
    pub account_id: Uuid,
    pub entries: usize,
    pub stored_total_points: i64,
    pub computed_total_points: i64,
    pub stored_lifetime_points: i64,
    pub computed_lifetime_points: i64,
    /// `balance_after` snapshot of the newest entry, if any. Disagreement
    /// with the computed total means the audit trail itself drifted.
    pub last_balance_after: Option<i64>,
}

impl DriftReport {
    pub fn is_consistent(&self) -> bool {
        self.stored_total_points == self.computed_total_points
            && self.stored_lifetime_points == self.computed_lifetime_points
            && self
                .last_balance_after
                .map_or(true, |b| b == self.computed_total_points)
    }

    /// Convert to a hard error when callers treat drift as fatal.
    pub fn into_result(self) -> Result<Self> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(LoyaltyError::Consistency(self))
        }
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "account {} over {} entries: total {} (computed {}), lifetime {} (computed {})",
            self.account_id,
            self.entries,
            self.stored_total_points,
            self.computed_total_points,
            self.stored_lifetime_points,
            self.computed_lifetime_points,
        )
    }
}

/// Ledger service over a [`LedgerStore`].
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn CatalogStore>,
    bus: EventBus,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn CatalogStore>, bus: EventBus) -> Self {
        Self {
            store,
            catalog,
            bus,
        }
    }

    /// Append a ledger entry and advance the projection atomically, then
    /// re-resolve the account's tier.
    ///
    /// Validation that needs no account state runs here, before any
    /// write; the underflow check runs inside the store transaction.
    pub async fn append(&self, req: AppendRequest) -> Result<AppendOutcome> {
        if req.points == 0 {
            return Err(LoyaltyError::Validation(
                "point delta must be nonzero".to_string(),
            ));
        }
        if req.kind.requires_reason()
            && req.reason.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(LoyaltyError::Validation(format!(
                "{} entries require a reason",
                req.kind
            )));
        }
        if req.allow_negative_balance && req.kind != crate::domain::TransactionKind::Adjustment {
            return Err(LoyaltyError::Validation(
                "only adjustments may allow a negative balance".to_string(),
            ));
        }

        let mut outcome = self.store.append(req).await?;

        debug!(
            account = %outcome.account.id,
            transaction = outcome.transaction.id,
            points = outcome.transaction.points,
            kind = %outcome.transaction.kind,
            balance_after = outcome.transaction.balance_after,
            "ledger append committed"
        );

        self.bus.publish(DomainEvent::PointsApplied {
            account_id: outcome.account.id,
            transaction_id: outcome.transaction.id,
            kind: outcome.transaction.kind,
            points: outcome.transaction.points,
            balance_after: outcome.transaction.balance_after,
        });

        outcome.account = self.retier(outcome.account).await?;

        Ok(outcome)
    }

    /// Recompute the tier from `lifetime_points` and persist a change.
    ///
    /// Upgrade-only in practice: lifetime points only decrease through
    /// expiration entries, so spending never downgrades.
    async fn retier(&self, mut account: LoyaltyAccount) -> Result<LoyaltyAccount> {
        let tiers = self.catalog.tiers(account.program_id).await?;
        let Some(resolved) = resolve_tier(account.lifetime_points, &tiers) else {
            return Ok(account);
        };

        if account.current_tier_id != Some(resolved.id) {
            self.store.update_tier(account.id, resolved.id).await?;
            info!(
                account = %account.id,
                tier = %resolved.name,
                lifetime_points = account.lifetime_points,
                "tier changed"
            );
            self.bus.publish(DomainEvent::TierChanged {
                account_id: account.id,
                previous_tier_id: account.current_tier_id,
                current_tier_id: resolved.id,
                tier_name: resolved.name.clone(),
            });
            account.current_tier_id = Some(resolved.id);
        }

        Ok(account)
    }

    /// Spend points. `points` is the positive amount to deduct; a
    /// redemption that would underflow is rejected, not clamped.
    pub async fn redeem(
        &self,
        account_id: Uuid,
        points: i64,
        order_id: Option<Uuid>,
    ) -> Result<AppendOutcome> {
        if points <= 0 {
            return Err(LoyaltyError::Validation(
                "redemption amount must be positive".to_string(),
            ));
        }
        let mut req = AppendRequest::new(account_id, -points, crate::domain::TransactionKind::Redeem);
        req.order_id = order_id;
        self.append(req).await
    }

    pub async fn account(&self, account_id: Uuid) -> Result<LoyaltyAccount> {
        self.store
            .account(account_id)
            .await?
            .ok_or(LoyaltyError::UnknownAccount(account_id))
    }

    /// Projected balance read; never scans the ledger.
    pub async fn balance(&self, account_id: Uuid) -> Result<BalanceSummary> {
        let account = self.account(account_id).await?;
        Ok(BalanceSummary {
            account_id: account.id,
            total_points: account.total_points,
            lifetime_points: account.lifetime_points,
            tier_id: account.current_tier_id,
        })
    }

    /// Reverse-chronological, cursor-paginated history.
    pub async fn history(
        &self,
        account_id: Uuid,
        limit: u32,
        before_id: Option<i64>,
    ) -> Result<Vec<LoyaltyTransaction>> {
        // Keep unknown accounts distinguishable from empty history.
        self.account(account_id).await?;
        self.store.history(account_id, limit, before_id).await
    }

    /// Fold the full history and compare against the stored projection.
    pub async fn reconcile(&self, account_id: Uuid) -> Result<DriftReport> {
        let account = self.account(account_id).await?;
        let history = self.store.full_history(account_id).await?;
        let computed = projection::fold(&history);

        let report = DriftReport {
            account_id,
            entries: history.len(),
            stored_total_points: account.total_points,
            computed_total_points: computed.total_points,
            stored_lifetime_points: account.lifetime_points,
            computed_lifetime_points: computed.lifetime_points,
            last_balance_after: history.last().map(|tx| tx.balance_after),
        };

        if !report.is_consistent() {
            warn!(account = %account_id, report = %report, "ledger drift detected");
        }

        Ok(report)
    }
}
