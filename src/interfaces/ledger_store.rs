//! Ledger storage interface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{LoyaltyAccount, LoyaltyTransaction, TransactionKind};
use crate::error::Result;

/// A ledger append to be applied atomically with its balance projection.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub account_id: Uuid,
    /// Signed, nonzero point delta.
    pub points: i64,
    pub kind: TransactionKind,
    pub reason: Option<String>,
    pub order_id: Option<Uuid>,
    /// When set, the append also counts an order against the account:
    /// `total_orders + 1`, `total_spent_cents + value`, `last_order_at`.
    pub order_total_cents: Option<i64>,
    /// Adjustments explicitly flagged to allow negative balance
    /// correction bypass the underflow check.
    pub allow_negative_balance: bool,
}

impl AppendRequest {
    pub fn new(account_id: Uuid, points: i64, kind: TransactionKind) -> Self {
        Self {
            account_id,
            points,
            kind,
            reason: None,
            order_id: None,
            order_total_cents: None,
            allow_negative_balance: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_order(mut self, order_id: Uuid, total_cents: i64) -> Self {
        self.order_id = Some(order_id);
        self.order_total_cents = Some(total_cents);
        self
    }

    pub fn allowing_negative_balance(mut self) -> Self {
        self.allow_negative_balance = true;
        self
    }
}

/// Result of a committed append: the new ledger row and the account with
/// its projection already advanced.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub transaction: LoyaltyTransaction,
    pub account: LoyaltyAccount,
}

/// Fields needed to open a loyalty account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub customer_id: Uuid,
    pub program_id: Uuid,
    pub referral_code: String,
    pub current_tier_id: Option<Uuid>,
}

/// Interface for ledger and account persistence.
///
/// `append` is the one write path for points: the transaction row insert
/// and the account projection update commit or fail together. A ledger
/// row with no corresponding balance update (or vice versa) is a
/// consistency violation.
///
/// Implementations:
/// - `SqliteLedgerStore`: SQLite storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Atomically validate, insert the ledger entry, and advance the
    /// account projection.
    ///
    /// Fails with `UnknownAccount` / `InactiveAccount` for bad targets
    /// and `InsufficientBalance` when a negative delta would underflow
    /// (unless the request allows negative balance). All checks run
    /// inside the same transaction as the write.
    async fn append(&self, req: AppendRequest) -> Result<AppendOutcome>;

    /// Create an account with zeroed projection.
    async fn create_account(&self, new: NewAccount) -> Result<LoyaltyAccount>;

    async fn account(&self, id: Uuid) -> Result<Option<LoyaltyAccount>>;

    /// Membership of a customer in a specific program.
    async fn account_by_customer(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
    ) -> Result<Option<LoyaltyAccount>>;

    /// Any membership of a customer (order events may carry only a
    /// customer id). First match by join date if the customer somehow
    /// holds several.
    async fn account_for_customer(&self, customer_id: Uuid) -> Result<Option<LoyaltyAccount>>;

    async fn account_by_referral_code(&self, code: &str) -> Result<Option<LoyaltyAccount>>;

    /// Persist a resolved tier change.
    async fn update_tier(&self, account_id: Uuid, tier_id: Uuid) -> Result<()>;

    /// Reverse-chronological page of ledger entries. `before_id` is an
    /// exclusive cursor from a previous page.
    async fn history(
        &self,
        account_id: Uuid,
        limit: u32,
        before_id: Option<i64>,
    ) -> Result<Vec<LoyaltyTransaction>>;

    /// Full history in append order, for reconciliation folds.
    async fn full_history(&self, account_id: Uuid) -> Result<Vec<LoyaltyTransaction>>;

    /// Record a bulk-award idempotency key. Returns false when the key
    /// was already present (duplicate batch).
    async fn register_batch(&self, key: &str) -> Result<bool>;
}
