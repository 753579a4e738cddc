//! Order status synchronization.
//!
//! Two transports deliver order state: a push subscription (primary)
//! and a fixed-interval poll (backstop). Both feed one merge function,
//! so the staleness and idempotency rules hold uniformly regardless of
//! which transport a payload arrived on.

pub mod status;
pub mod tracker;

pub use status::{can_transition, is_reachable, merge, Merge};
pub use tracker::{OrderTracker, TrackingState};
