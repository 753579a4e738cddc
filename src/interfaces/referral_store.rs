//! Referral record interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::ReferralRecord;
use crate::error::Result;

/// Interface for referral record persistence.
///
/// Status flips are compare-and-set against the expected current status
/// so a racing duplicate trigger loses cleanly instead of transitioning
/// twice.
///
/// Implementations:
/// - `SqliteReferralStore`: SQLite storage
#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn create(&self, record: &ReferralRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<ReferralRecord>>;

    /// The pending referral naming this account as referee, if any.
    async fn pending_for_referee(&self, referee: Uuid) -> Result<Option<ReferralRecord>>;

    /// Whether any non-expired referral already names this referee.
    async fn referee_already_referred(&self, referee: Uuid) -> Result<bool>;

    /// Completed + rewarded referrals originated by this referrer, for
    /// cap enforcement.
    async fn settled_count(&self, referrer: Uuid) -> Result<i64>;

    /// `Pending -> Completed` compare-and-set. Returns false if the
    /// record was not pending.
    async fn complete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// `Completed -> Rewarded` compare-and-set. Returns false if the
    /// record was not completed.
    async fn mark_rewarded(&self, id: Uuid) -> Result<bool>;

    /// Write-once payout claims. Returns false if the side was already
    /// claimed; the caller appends the payout only after winning the
    /// claim, so concurrent retries can never double-pay.
    async fn mark_referrer_rewarded(&self, id: Uuid) -> Result<bool>;
    async fn mark_referee_rewarded(&self, id: Uuid) -> Result<bool>;

    /// Expire all pending referrals created before the cutoff. Returns
    /// the number of records transitioned.
    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
