//! Program and tier catalog interface.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{LoyaltyProgram, LoyaltyTier, ReferralProgram, TierBucket};
use crate::error::Result;

/// Interface for loyalty program and tier configuration.
///
/// Implementations:
/// - `SqliteCatalogStore`: SQLite storage
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn program(&self, id: Uuid) -> Result<Option<LoyaltyProgram>>;

    async fn upsert_program(&self, program: &LoyaltyProgram) -> Result<()>;

    /// Tiers of a program, ascending by `min_points`.
    async fn tiers(&self, program_id: Uuid) -> Result<Vec<LoyaltyTier>>;

    /// Insert a tier. Rejects a duplicate name or a `min_points` equal
    /// to an existing tier of the same program (thresholds must be
    /// strictly increasing).
    async fn add_tier(&self, tier: &LoyaltyTier) -> Result<()>;

    /// Server-computed account count per tier for a program. The UI is
    /// never the source of truth for this aggregate.
    async fn tier_distribution(&self, program_id: Uuid) -> Result<Vec<TierBucket>>;

    async fn referral_program_for_store(&self, store_id: Uuid)
        -> Result<Option<ReferralProgram>>;

    async fn upsert_referral_program(&self, program: &ReferralProgram) -> Result<()>;
}
