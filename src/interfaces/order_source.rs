//! Order record source for the tracking synchronizer.
//!
//! The order record is owned by the fulfillment collaborator; this core
//! only reads it, over two transports: a push subscription (primary) and
//! a poll fetch (backstop).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::domain::OrderSnapshot;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Push/poll network failures. Non-fatal: the alternate transport
/// continues to provide eventual correctness.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("fetch failed: {0}")]
    Fetch(String),
}

/// Stream of pushed order snapshots.
pub type OrderStream = Pin<Box<dyn Stream<Item = OrderSnapshot> + Send>>;

/// Read access to the external order record.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Poll path: re-fetch the full record. `None` means the order does
    /// not exist (or is not visible) right now.
    async fn fetch(&self, order_id: Uuid) -> Result<Option<OrderSnapshot>>;

    /// Push path: subscribe to state updates for one order.
    async fn subscribe(&self, order_id: Uuid) -> Result<OrderStream>;
}
