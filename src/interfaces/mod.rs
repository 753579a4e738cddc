//! Abstract interfaces for patronage components.
//!
//! These traits define the contracts for:
//! - Ledger storage (atomic append + balance projection, history reads)
//! - Catalog storage (programs, tiers, distribution aggregate)
//! - Referral storage (referral records and status flips)
//! - Order source (push subscription + poll fetch for tracking)
//!
//! Store traits return the domain `Result` so implementations can reject
//! inside their transaction boundary (e.g. `InsufficientBalance` is
//! checked under the same transaction that would append).

pub mod catalog_store;
pub mod ledger_store;
pub mod order_source;
pub mod referral_store;

pub use catalog_store::CatalogStore;
pub use ledger_store::{AppendOutcome, AppendRequest, LedgerStore, NewAccount};
pub use order_source::{OrderSource, OrderStream, TransportError};
pub use referral_store::ReferralStore;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid timestamp '{value}' in column {column}")]
    InvalidTimestamp { column: String, value: String },

    #[error("invalid enum value '{value}' in column {column}")]
    InvalidEnum { column: String, value: String },
}
