//! Tier resolution.
//!
//! Resolution is a pure function of `lifetime_points` and the program's
//! tier configuration; the stored `current_tier_id` is a cache of this
//! result, never a free choice.

use crate::domain::LoyaltyTier;

/// Resolve the tier for a lifetime point count.
///
/// Tiers must be sorted ascending by `min_points`. The result is the
/// tier with the greatest `min_points <= lifetime_points`; the boundary
/// value belongs to the higher tier. Below every threshold the lowest
/// tier wins (programs always configure a base tier at 0). Returns
/// `None` only for an empty tier list.
pub fn resolve_tier(lifetime_points: i64, tiers: &[LoyaltyTier]) -> Option<&LoyaltyTier> {
    let mut resolved = tiers.first()?;
    for tier in tiers {
        if tier.min_points <= lifetime_points {
            resolved = tier;
        } else {
            break;
        }
    }
    Some(resolved)
}
