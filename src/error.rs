//! Domain error taxonomy.
//!
//! Single-operation errors propagate to the caller synchronously.
//! Bulk-operation errors are collected per item and returned alongside
//! successes (see `awards::BulkAwardReport`). Tracking transport errors
//! use `tracking::TransportError` and never surface here.

use uuid::Uuid;

use crate::domain::ReferralStatus;
use crate::interfaces::StorageError;
use crate::ledger::DriftReport;

/// Result type for loyalty operations.
pub type Result<T> = std::result::Result<T, LoyaltyError>;

/// Errors from loyalty operations.
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyError {
    /// Rejected before any ledger write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A redeem that would underflow is rejected, not clamped.
    #[error("insufficient balance: {available} available, {requested} requested")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("unknown account: {0}")]
    UnknownAccount(Uuid),

    #[error("account is inactive: {0}")]
    InactiveAccount(Uuid),

    #[error("unknown program: {0}")]
    UnknownProgram(Uuid),

    #[error("no loyalty program configured for store {0}")]
    NoProgramForStore(Uuid),

    #[error("unknown referral code: {0}")]
    UnknownReferralCode(String),

    #[error("unknown referral: {0}")]
    UnknownReferral(Uuid),

    #[error("referral {id} is {status}, transition not allowed")]
    InvalidReferralState { id: Uuid, status: ReferralStatus },

    #[error("referrer {referrer} reached the referral cap of {cap}")]
    ReferralCapReached { referrer: Uuid, cap: i64 },

    /// Resubmitted bulk award batch; nothing was written.
    #[error("duplicate award batch: {0}")]
    DuplicateBatch(String),

    /// Ledger/projection drift; surfaced to operators, never auto-corrected.
    #[error("ledger drift detected: {0}")]
    Consistency(DriftReport),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for LoyaltyError {
    fn from(err: sqlx::Error) -> Self {
        LoyaltyError::Storage(StorageError::from(err))
    }
}
