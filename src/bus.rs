//! In-process domain event fan-out.
//!
//! Analytics and UI subscribe here for read-only notification; the bus
//! is never the system of record, and delivery is best-effort (lagging
//! subscribers miss events, the ledger does not).

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::domain::TransactionKind;

/// Events published after committed state changes.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A ledger append committed.
    PointsApplied {
        account_id: Uuid,
        transaction_id: i64,
        kind: TransactionKind,
        points: i64,
        balance_after: i64,
    },
    /// Tier re-resolution changed the account's tier.
    TierChanged {
        account_id: Uuid,
        previous_tier_id: Option<Uuid>,
        current_tier_id: Uuid,
        tier_name: String,
    },
    /// Both referral payouts settled.
    ReferralRewarded {
        referral_id: Uuid,
        referrer_account_id: Uuid,
        referee_account_id: Uuid,
    },
}

/// Broadcast bus for domain events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish to all current subscribers. No subscribers is fine.
    pub fn publish(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            debug!("domain event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::PointsApplied {
            account_id: Uuid::new_v4(),
            transaction_id: 1,
            kind: TransactionKind::Earn,
            points: 100,
            balance_after: 100,
        });

        match rx.recv().await.unwrap() {
            DomainEvent::PointsApplied { points, .. } => assert_eq!(points, 100),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new(8);
        bus.publish(DomainEvent::ReferralRewarded {
            referral_id: Uuid::new_v4(),
            referrer_account_id: Uuid::new_v4(),
            referee_account_id: Uuid::new_v4(),
        });
    }
}
