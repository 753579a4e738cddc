//! Balance projection math.
//!
//! The materialized `total_points` / `lifetime_points` pair on an
//! account is a pure fold over its ledger history. Storage applies
//! [`apply`] inside the append transaction; reconciliation re-derives
//! the pair with [`fold`] and compares.

use crate::domain::{LoyaltyTransaction, TransactionKind};

/// A projected balance pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balances {
    pub total_points: i64,
    pub lifetime_points: i64,
}

/// Advance a projection by one ledger entry.
///
/// `total_points` moves by the signed delta. `lifetime_points` only
/// accumulates positive deltas, with one exception: `Expire` entries
/// reduce it, which is what makes tier downgrades possible after point
/// expiration and only then.
pub fn apply(balances: Balances, points: i64, kind: TransactionKind) -> Balances {
    let lifetime_delta = if points > 0 {
        points
    } else if kind == TransactionKind::Expire {
        points
    } else {
        0
    };

    Balances {
        total_points: balances.total_points + points,
        lifetime_points: (balances.lifetime_points + lifetime_delta).max(0),
    }
}

/// Recompute both fields from scratch over full history, in append order.
pub fn fold(history: &[LoyaltyTransaction]) -> Balances {
    history.iter().fold(Balances::default(), |acc, tx| {
        apply(acc, tx.points, tx.kind)
    })
}
