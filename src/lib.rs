//! Patronage - loyalty ledger and tier engine
//!
//! The customer loyalty core for a storefront product: an append-only
//! point ledger with an atomically maintained balance projection, tier
//! resolution over lifetime points, single and bulk award services, a
//! referral reward coordinator, and the dual-transport order status
//! synchronizer used for pickup tracking.

pub mod awards;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod facade;
pub mod interfaces;
pub mod ledger;
pub mod logging;
pub mod projection;
pub mod referrals;
pub mod storage;
pub mod tiers;
pub mod tracking;

pub use error::{LoyaltyError, Result};
pub use facade::Loyalty;
