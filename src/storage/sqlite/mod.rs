//! SQLite implementations of storage interfaces.

mod catalog_store;
mod ledger_store;
mod referral_store;

pub use catalog_store::SqliteCatalogStore;
pub use ledger_store::SqliteLedgerStore;
pub use referral_store::SqliteReferralStore;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::{
    LoyaltyAccount, LoyaltyProgram, LoyaltyTier, LoyaltyTransaction, ReferralProgram,
    ReferralRecord, ReferralStatus, TransactionKind,
};
use crate::interfaces::StorageError;

pub(crate) fn parse_ts(column: &str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp {
            column: column.to_string(),
            value: value.to_string(),
        })
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid, StorageError> {
    let value: String = row.get(column);
    Ok(Uuid::parse_str(&value)?)
}

fn get_opt_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, StorageError> {
    let value: Option<String> = row.get(column);
    Ok(value.map(|v| Uuid::parse_str(&v)).transpose()?)
}

fn get_ts(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, StorageError> {
    let value: String = row.get(column);
    parse_ts(column, &value)
}

fn get_opt_ts(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
    let value: Option<String> = row.get(column);
    value.map(|v| parse_ts(column, &v)).transpose()
}

pub(crate) fn account_from_row(row: &SqliteRow) -> Result<LoyaltyAccount, StorageError> {
    Ok(LoyaltyAccount {
        id: get_uuid(row, "id")?,
        customer_id: get_uuid(row, "customer_id")?,
        program_id: get_uuid(row, "program_id")?,
        referral_code: row.get("referral_code"),
        current_tier_id: get_opt_uuid(row, "current_tier_id")?,
        total_points: row.get("total_points"),
        lifetime_points: row.get("lifetime_points"),
        total_orders: row.get("total_orders"),
        total_spent_cents: row.get("total_spent_cents"),
        is_active: row.get::<i64, _>("is_active") != 0,
        joined_at: get_ts(row, "joined_at")?,
        last_order_at: get_opt_ts(row, "last_order_at")?,
    })
}

pub(crate) fn transaction_from_row(row: &SqliteRow) -> Result<LoyaltyTransaction, StorageError> {
    let kind_raw: String = row.get("kind");
    let kind = TransactionKind::parse(&kind_raw).ok_or_else(|| StorageError::InvalidEnum {
        column: "kind".to_string(),
        value: kind_raw,
    })?;

    Ok(LoyaltyTransaction {
        id: row.get("id"),
        account_id: get_uuid(row, "account_id")?,
        order_id: get_opt_uuid(row, "order_id")?,
        kind,
        points: row.get("points"),
        reason: row.get("reason"),
        balance_after: row.get("balance_after"),
        created_at: get_ts(row, "created_at")?,
    })
}

pub(crate) fn tier_from_row(row: &SqliteRow) -> Result<LoyaltyTier, StorageError> {
    Ok(LoyaltyTier {
        id: get_uuid(row, "id")?,
        program_id: get_uuid(row, "program_id")?,
        name: row.get("name"),
        min_points: row.get("min_points"),
        discount_percentage: row.get("discount_percentage"),
        free_delivery: row.get::<i64, _>("free_delivery") != 0,
        priority_support: row.get::<i64, _>("priority_support") != 0,
        birthday_reward_points: row.get("birthday_reward_points"),
        sort_order: row.get("sort_order"),
    })
}

pub(crate) fn program_from_row(row: &SqliteRow) -> Result<LoyaltyProgram, StorageError> {
    Ok(LoyaltyProgram {
        id: get_uuid(row, "id")?,
        store_id: get_uuid(row, "store_id")?,
        points_per_dollar: row.get("points_per_dollar"),
        welcome_bonus_points: row.get("welcome_bonus_points"),
        referral_bonus_points: row.get("referral_bonus_points"),
        is_active: row.get::<i64, _>("is_active") != 0,
    })
}

pub(crate) fn referral_program_from_row(row: &SqliteRow) -> Result<ReferralProgram, StorageError> {
    Ok(ReferralProgram {
        id: get_uuid(row, "id")?,
        store_id: get_uuid(row, "store_id")?,
        min_order_value_cents: row.get("min_order_value_cents"),
        referrer_reward_points: row.get("referrer_reward_points"),
        referee_reward_points: row.get("referee_reward_points"),
        max_referrals_per_customer: row.get("max_referrals_per_customer"),
        ttl_days: row.get("ttl_days"),
        is_active: row.get::<i64, _>("is_active") != 0,
    })
}

pub(crate) fn referral_from_row(row: &SqliteRow) -> Result<ReferralRecord, StorageError> {
    let status_raw: String = row.get("status");
    let status = ReferralStatus::parse(&status_raw).ok_or_else(|| StorageError::InvalidEnum {
        column: "status".to_string(),
        value: status_raw,
    })?;

    Ok(ReferralRecord {
        id: get_uuid(row, "id")?,
        code: row.get("code"),
        referrer_account_id: get_uuid(row, "referrer_account_id")?,
        referee_account_id: get_opt_uuid(row, "referee_account_id")?,
        status,
        referrer_rewarded: row.get::<i64, _>("referrer_rewarded") != 0,
        referee_rewarded: row.get::<i64, _>("referee_rewarded") != 0,
        created_at: get_ts(row, "created_at")?,
        completed_at: get_opt_ts(row, "completed_at")?,
    })
}
