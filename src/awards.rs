//! Award service: manual point grants and order-completion intake.
//!
//! Bulk awards process each account as an independent transaction; one
//! bad account never rolls back or blocks the others. The aggregate
//! result is a best-effort report, not a transaction boundary.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    LoyaltyAccount, LoyaltyTransaction, OrderCompletion, TransactionKind,
};
use crate::error::{LoyaltyError, Result};
use crate::interfaces::{AppendRequest, CatalogStore, LedgerStore, NewAccount};
use crate::ledger::Ledger;
use crate::tiers::resolve_tier;

/// Result of an order-completion event: the resolved account (so later
/// stages key off it even when nothing was earned) and the earn entry,
/// if any.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub account: LoyaltyAccount,
    pub earned: Option<LoyaltyTransaction>,
}

/// Per-account outcome of a bulk award.
#[derive(Debug)]
pub struct BulkOutcome {
    pub account_id: Uuid,
    pub result: Result<LoyaltyTransaction>,
}

/// Aggregate bulk award result. Partial success is the normal case, not
/// an error.
#[derive(Debug)]
pub struct BulkAwardReport {
    pub outcomes: Vec<BulkOutcome>,
}

impl BulkAwardReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Award entry points sharing validation, plus enrollment and the
/// order-completion hook that drives earning.
pub struct AwardService {
    ledger: Arc<Ledger>,
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl AwardService {
    pub fn new(
        ledger: Arc<Ledger>,
        store: Arc<dyn LedgerStore>,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            ledger,
            store,
            catalog,
        }
    }

    /// Manual award to one account. Positive grants are recorded as
    /// `Bonus`, negative corrections as `Adjustment`; both require a
    /// reason. Negative corrections still may not underflow the balance.
    pub async fn award_single(
        &self,
        account_id: Uuid,
        points: i64,
        reason: &str,
    ) -> Result<LoyaltyTransaction> {
        validate_reason(reason)?;
        if points == 0 {
            return Err(LoyaltyError::Validation(
                "point delta must be nonzero".to_string(),
            ));
        }

        let kind = if points > 0 {
            TransactionKind::Bonus
        } else {
            TransactionKind::Adjustment
        };

        let outcome = self
            .ledger
            .append(AppendRequest::new(account_id, points, kind).with_reason(reason))
            .await?;

        Ok(outcome.transaction)
    }

    /// Bulk grant to many accounts. Award-only: `points` must be
    /// positive. Each account is an independent transaction; failures
    /// are collected per item and returned alongside successes.
    ///
    /// An optional idempotency key guards against batch resubmission
    /// (e.g. a UI retry after a timeout): a reused key rejects the whole
    /// batch before any write.
    pub async fn award_bulk(
        &self,
        account_ids: &[Uuid],
        points: i64,
        reason: &str,
        idempotency_key: Option<&str>,
    ) -> Result<BulkAwardReport> {
        validate_reason(reason)?;
        if points <= 0 {
            return Err(LoyaltyError::Validation(
                "bulk awards must grant a positive point amount".to_string(),
            ));
        }
        if account_ids.is_empty() {
            return Err(LoyaltyError::Validation(
                "bulk award requires at least one account".to_string(),
            ));
        }

        if let Some(key) = idempotency_key {
            if !self.store.register_batch(key).await? {
                return Err(LoyaltyError::DuplicateBatch(key.to_string()));
            }
        }

        let mut outcomes = Vec::with_capacity(account_ids.len());
        for &account_id in account_ids {
            let result = self
                .ledger
                .append(
                    AppendRequest::new(account_id, points, TransactionKind::Bonus)
                        .with_reason(reason),
                )
                .await
                .map(|outcome| outcome.transaction);

            if let Err(err) = &result {
                debug!(account = %account_id, error = %err, "bulk award item failed");
            }

            outcomes.push(BulkOutcome { account_id, result });
        }

        let report = BulkAwardReport { outcomes };
        info!(
            total = account_ids.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "bulk award processed"
        );

        Ok(report)
    }

    /// Open a loyalty account for a customer, resolving the base tier
    /// and granting the program's welcome bonus when configured.
    pub async fn enroll(&self, customer_id: Uuid, program_id: Uuid) -> Result<LoyaltyAccount> {
        let program = self
            .catalog
            .program(program_id)
            .await?
            .ok_or(LoyaltyError::UnknownProgram(program_id))?;
        if !program.is_active {
            return Err(LoyaltyError::Validation(
                "program is not accepting enrollments".to_string(),
            ));
        }
        if self
            .store
            .account_by_customer(customer_id, program_id)
            .await?
            .is_some()
        {
            return Err(LoyaltyError::Validation(
                "customer is already enrolled in this program".to_string(),
            ));
        }

        let tiers = self.catalog.tiers(program_id).await?;
        let base_tier = resolve_tier(0, &tiers).map(|t| t.id);

        let account = self
            .store
            .create_account(NewAccount {
                customer_id,
                program_id,
                referral_code: mint_referral_code(),
                current_tier_id: base_tier,
            })
            .await?;

        if program.welcome_bonus_points > 0 {
            let outcome = self
                .ledger
                .append(
                    AppendRequest::new(
                        account.id,
                        program.welcome_bonus_points,
                        TransactionKind::Bonus,
                    )
                    .with_reason("welcome bonus"),
                )
                .await?;
            return Ok(outcome.account);
        }

        Ok(account)
    }

    /// Apply an order-completion event: compute the earn delta from the
    /// program's rate and append it together with the account's order
    /// counters. Earning nothing (inactive program, zero-point total) is
    /// not an error; the resolved account is returned either way so the
    /// referral stage runs regardless of the earn outcome.
    pub async fn order_completed(&self, completion: &OrderCompletion) -> Result<OrderOutcome> {
        let account = self.resolve_account(completion).await?;

        let program = self
            .catalog
            .program(account.program_id)
            .await?
            .ok_or(LoyaltyError::UnknownProgram(account.program_id))?;
        if !program.is_active {
            debug!(account = %account.id, "program inactive, order earns nothing");
            return Ok(OrderOutcome {
                account,
                earned: None,
            });
        }

        let earned = earn_points(completion.order_total_cents, program.points_per_dollar);
        if earned <= 0 {
            debug!(
                account = %account.id,
                order = %completion.order_id,
                "order total below earn threshold"
            );
            return Ok(OrderOutcome {
                account,
                earned: None,
            });
        }

        let outcome = self
            .ledger
            .append(
                AppendRequest::new(account.id, earned, TransactionKind::Earn)
                    .with_order(completion.order_id, completion.order_total_cents),
            )
            .await?;

        info!(
            account = %account.id,
            order = %completion.order_id,
            points = earned,
            "order completion earned points"
        );

        Ok(OrderOutcome {
            account: outcome.account,
            earned: Some(outcome.transaction),
        })
    }

    async fn resolve_account(&self, completion: &OrderCompletion) -> Result<LoyaltyAccount> {
        if let Some(account_id) = completion.account_id {
            return self
                .store
                .account(account_id)
                .await?
                .ok_or(LoyaltyError::UnknownAccount(account_id));
        }
        if let Some(customer_id) = completion.customer_id {
            return self
                .store
                .account_for_customer(customer_id)
                .await?
                .ok_or(LoyaltyError::UnknownAccount(customer_id));
        }
        Err(LoyaltyError::Validation(
            "order completion carries neither account nor customer id".to_string(),
        ))
    }
}

/// Earned points for an order total, floored to whole points.
pub fn earn_points(order_total_cents: i64, points_per_dollar: i64) -> i64 {
    if order_total_cents <= 0 || points_per_dollar <= 0 {
        return 0;
    }
    order_total_cents * points_per_dollar / 100
}

fn validate_reason(reason: &str) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(LoyaltyError::Validation(
            "a reason is required".to_string(),
        ));
    }
    Ok(())
}

fn mint_referral_code() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("REF-{}", &raw[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earn_points_floors_to_whole_points() {
        // $12.49 at 2 points/dollar -> 24 points
        assert_eq!(earn_points(1249, 2), 24);
        assert_eq!(earn_points(99, 1), 0);
        assert_eq!(earn_points(100, 1), 1);
    }

    #[test]
    fn earn_points_rejects_nonsense_inputs() {
        assert_eq!(earn_points(-500, 2), 0);
        assert_eq!(earn_points(500, 0), 0);
    }

    #[test]
    fn referral_codes_are_prefixed_and_distinct() {
        let a = mint_referral_code();
        let b = mint_referral_code();
        assert!(a.starts_with("REF-"));
        assert_eq!(a.len(), "REF-".len() + 8);
        assert_ne!(a, b);
    }
}
