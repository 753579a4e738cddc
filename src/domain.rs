//! Core data model for the loyalty ledger and tier engine.
//!
//! Transaction kinds, referral states, and order statuses are closed
//! enums with exhaustive matching; adding a variant is a compile-time
//! checked change everywhere it is consumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One loyalty membership per (customer, program).
///
/// `total_points` and `lifetime_points` are a projection of the
/// transaction ledger, maintained atomically with every append. Reads
/// never need to scan the ledger; the ledger stays the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyAccount {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub program_id: Uuid,
    /// Code other customers enter to be referred by this account.
    pub referral_code: String,
    pub current_tier_id: Option<Uuid>,
    /// Signed sum of all ledger entries; never negative.
    pub total_points: i64,
    /// Sum of positive deltas (expiration excepted); drives tier resolution.
    pub lifetime_points: i64,
    pub total_orders: i64,
    pub total_spent_cents: i64,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub last_order_at: Option<DateTime<Utc>>,
}

/// Ledger entry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earn,
    Redeem,
    Bonus,
    Expire,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Earn => "earn",
            TransactionKind::Redeem => "redeem",
            TransactionKind::Bonus => "bonus",
            TransactionKind::Expire => "expire",
            TransactionKind::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earn" => Some(TransactionKind::Earn),
            "redeem" => Some(TransactionKind::Redeem),
            "bonus" => Some(TransactionKind::Bonus),
            "expire" => Some(TransactionKind::Expire),
            "adjustment" => Some(TransactionKind::Adjustment),
            _ => None,
        }
    }

    /// Kinds that must carry an operator-supplied reason.
    pub fn requires_reason(&self) -> bool {
        matches!(self, TransactionKind::Bonus | TransactionKind::Adjustment)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, append-only ledger entry.
///
/// Never updated or deleted; corrections are new offsetting entries.
/// `id` is a monotonic rowid acting as the logical clock for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub id: i64,
    pub account_id: Uuid,
    pub order_id: Option<Uuid>,
    pub kind: TransactionKind,
    /// Signed, nonzero point delta.
    pub points: i64,
    pub reason: Option<String>,
    /// Redundant balance snapshot for audit and drift detection.
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

/// A named band of lifetime points conferring perks.
///
/// Tiers of one program have strictly increasing `min_points`; there is
/// always a base tier with `min_points = 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyTier {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    pub min_points: i64,
    pub discount_percentage: f64,
    pub free_delivery: bool,
    pub priority_support: bool,
    pub birthday_reward_points: i64,
    pub sort_order: i64,
}

/// Active loyalty configuration for a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyProgram {
    pub id: Uuid,
    pub store_id: Uuid,
    /// Earn rate applied to completed order totals.
    pub points_per_dollar: i64,
    pub welcome_bonus_points: i64,
    pub referral_bonus_points: i64,
    pub is_active: bool,
}

/// Referral reward configuration for a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralProgram {
    pub id: Uuid,
    pub store_id: Uuid,
    /// Referee order total that completes a pending referral.
    pub min_order_value_cents: i64,
    pub referrer_reward_points: i64,
    pub referee_reward_points: i64,
    pub max_referrals_per_customer: i64,
    pub ttl_days: i64,
    pub is_active: bool,
}

/// Referral lifecycle: `Pending -> Completed -> Rewarded`, with
/// `Expired` reachable from `Pending` only. `Rewarded` and `Expired`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Completed,
    Rewarded,
    Expired,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Completed => "completed",
            ReferralStatus::Rewarded => "rewarded",
            ReferralStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReferralStatus::Pending),
            "completed" => Some(ReferralStatus::Completed),
            "rewarded" => Some(ReferralStatus::Rewarded),
            "expired" => Some(ReferralStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One referred customer.
///
/// The `referrer_rewarded` / `referee_rewarded` booleans are write-once
/// guards against double payout; a retried reward transition is a no-op
/// once both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub id: Uuid,
    pub code: String,
    pub referrer_account_id: Uuid,
    pub referee_account_id: Option<Uuid>,
    pub status: ReferralStatus,
    pub referrer_rewarded: bool,
    pub referee_rewarded: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Order lifecycle as projected for customer-facing tracking.
///
/// Owned by the order-fulfillment collaborator; this core only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states have no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the external order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

/// Order-completion event consumed from the fulfillment collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCompletion {
    /// Either the loyalty account id or the customer id must be set.
    pub account_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub order_id: Uuid,
    pub order_total_cents: i64,
}

/// Read-model summary returned by `get_balance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSummary {
    pub account_id: Uuid,
    pub total_points: i64,
    pub lifetime_points: i64,
    pub tier_id: Option<Uuid>,
}

/// One bucket of the server-computed tier distribution aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierBucket {
    pub tier_id: Option<Uuid>,
    pub tier_name: Option<String>,
    pub count: i64,
}
