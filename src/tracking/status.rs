//! Order status state machine and payload merge.

use crate::domain::{OrderSnapshot, OrderStatus};

/// Whether `from -> to` is a directly allowed edge.
///
/// The forward path is `pending -> confirmed -> preparing -> ready ->
/// completed`; `cancelled` is reachable from any non-terminal state;
/// terminal states have no outgoing edges.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Confirmed)
        | (Confirmed, Preparing)
        | (Preparing, Ready)
        | (Ready, Completed) => true,
        (from, Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

/// Whether `to` is reachable from `from` through allowed edges.
///
/// The synchronizer accepts forward jumps (a missed push means the next
/// observed snapshot may be several steps ahead), so merging checks
/// reachability rather than single edges.
pub fn is_reachable(from: OrderStatus, to: OrderStatus) -> bool {
    if from == to {
        return false;
    }
    if from.is_terminal() {
        return false;
    }
    if to == OrderStatus::Cancelled {
        return true;
    }
    rank(from) < rank(to)
}

fn rank(status: OrderStatus) -> u8 {
    use OrderStatus::*;
    match status {
        Pending => 0,
        Confirmed => 1,
        Preparing => 2,
        Ready => 3,
        Completed => 4,
        // Cancelled sits outside the forward path; reachability to it is
        // handled explicitly above.
        Cancelled => 5,
    }
}

/// Merge decision for an incoming snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Incoming snapshot replaces the held one.
    Applied,
    /// Same state as held: idempotent re-delivery, no event emission.
    Duplicate,
    /// Older timestamp than held: out-of-order delivery, discarded.
    Stale,
    /// Timestamp is fresh but the transition is not reachable.
    Unreachable,
}

/// Single merge point for both transports.
///
/// A payload is discarded if its `updated_at` is older than the held
/// record's (poll and push race and may deliver out-of-order
/// snapshots), if it repeats the held state, or if no path of allowed
/// edges leads to it.
pub fn merge(held: Option<&OrderSnapshot>, incoming: &OrderSnapshot) -> Merge {
    let Some(held) = held else {
        return Merge::Applied;
    };

    if incoming.status == held.status {
        return Merge::Duplicate;
    }
    if incoming.updated_at < held.updated_at {
        return Merge::Stale;
    }
    if !is_reachable(held.status, incoming.status) {
        return Merge::Unreachable;
    }

    Merge::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn snap(status: OrderStatus, secs: i64) -> OrderSnapshot {
        OrderSnapshot {
            id: Uuid::nil(),
            status,
            updated_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn forward_edges_are_allowed() {
        use OrderStatus::*;
        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Confirmed, Preparing));
        assert!(can_transition(Preparing, Ready));
        assert!(can_transition(Ready, Completed));
    }

    #[test]
    fn cancellation_only_from_non_terminal() {
        use OrderStatus::*;
        for from in [Pending, Confirmed, Preparing, Ready] {
            assert!(can_transition(from, Cancelled));
        }
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Cancelled, Cancelled));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        use OrderStatus::*;
        for to in [Pending, Confirmed, Preparing, Ready, Completed, Cancelled] {
            assert!(!can_transition(Completed, to));
            assert!(!can_transition(Cancelled, to));
        }
    }

    #[test]
    fn backward_edges_are_rejected() {
        use OrderStatus::*;
        assert!(!can_transition(Ready, Preparing));
        assert!(!can_transition(Confirmed, Pending));
        assert!(!is_reachable(Ready, Preparing));
    }

    #[test]
    fn reachability_allows_forward_jumps() {
        use OrderStatus::*;
        assert!(is_reachable(Pending, Ready));
        assert!(is_reachable(Confirmed, Completed));
        assert!(!is_reachable(Completed, Cancelled));
    }

    #[test]
    fn merge_applies_first_snapshot() {
        let incoming = snap(OrderStatus::Pending, 10);
        assert_eq!(merge(None, &incoming), Merge::Applied);
    }

    #[test]
    fn merge_ignores_duplicate_state() {
        let held = snap(OrderStatus::Preparing, 10);
        let incoming = snap(OrderStatus::Preparing, 20);
        assert_eq!(merge(Some(&held), &incoming), Merge::Duplicate);
    }

    #[test]
    fn merge_discards_stale_payloads() {
        // Poll delivers `preparing` after push already delivered `ready`
        // with a newer timestamp: held state must not regress.
        let held = snap(OrderStatus::Ready, 30);
        let incoming = snap(OrderStatus::Preparing, 20);
        assert_eq!(merge(Some(&held), &incoming), Merge::Stale);
    }

    #[test]
    fn merge_rejects_unreachable_transitions() {
        // Fresh timestamp but no allowed path backwards.
        let held = snap(OrderStatus::Ready, 10);
        let incoming = snap(OrderStatus::Confirmed, 20);
        assert_eq!(merge(Some(&held), &incoming), Merge::Unreachable);
    }

    #[test]
    fn merge_applies_forward_progress() {
        let held = snap(OrderStatus::Pending, 10);
        let incoming = snap(OrderStatus::Preparing, 20);
        assert_eq!(merge(Some(&held), &incoming), Merge::Applied);

        let cancelled = snap(OrderStatus::Cancelled, 30);
        assert_eq!(merge(Some(&held), &cancelled), Merge::Applied);
    }
}
