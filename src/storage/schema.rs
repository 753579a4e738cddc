//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Loyalty accounts table schema.
#[derive(Iden)]
pub enum Accounts {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "customer_id"]
    CustomerId,
    #[iden = "program_id"]
    ProgramId,
    #[iden = "referral_code"]
    ReferralCode,
    #[iden = "current_tier_id"]
    CurrentTierId,
    #[iden = "total_points"]
    TotalPoints,
    #[iden = "lifetime_points"]
    LifetimePoints,
    #[iden = "total_orders"]
    TotalOrders,
    #[iden = "total_spent_cents"]
    TotalSpentCents,
    #[iden = "is_active"]
    IsActive,
    #[iden = "joined_at"]
    JoinedAt,
    #[iden = "last_order_at"]
    LastOrderAt,
}

/// Ledger transactions table schema.
#[derive(Iden)]
pub enum Transactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "account_id"]
    AccountId,
    #[iden = "order_id"]
    OrderId,
    #[iden = "kind"]
    Kind,
    #[iden = "points"]
    Points,
    #[iden = "reason"]
    Reason,
    #[iden = "balance_after"]
    BalanceAfter,
    #[iden = "created_at"]
    CreatedAt,
}

/// Loyalty tiers table schema.
#[derive(Iden)]
pub enum Tiers {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "program_id"]
    ProgramId,
    #[iden = "name"]
    Name,
    #[iden = "min_points"]
    MinPoints,
    #[iden = "discount_percentage"]
    DiscountPercentage,
    #[iden = "free_delivery"]
    FreeDelivery,
    #[iden = "priority_support"]
    PrioritySupport,
    #[iden = "birthday_reward_points"]
    BirthdayRewardPoints,
    #[iden = "sort_order"]
    SortOrder,
}

/// Loyalty programs table schema.
#[derive(Iden)]
pub enum Programs {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "store_id"]
    StoreId,
    #[iden = "points_per_dollar"]
    PointsPerDollar,
    #[iden = "welcome_bonus_points"]
    WelcomeBonusPoints,
    #[iden = "referral_bonus_points"]
    ReferralBonusPoints,
    #[iden = "is_active"]
    IsActive,
}

/// Referral programs table schema.
#[derive(Iden)]
pub enum ReferralPrograms {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "store_id"]
    StoreId,
    #[iden = "min_order_value_cents"]
    MinOrderValueCents,
    #[iden = "referrer_reward_points"]
    ReferrerRewardPoints,
    #[iden = "referee_reward_points"]
    RefereeRewardPoints,
    #[iden = "max_referrals_per_customer"]
    MaxReferralsPerCustomer,
    #[iden = "ttl_days"]
    TtlDays,
    #[iden = "is_active"]
    IsActive,
}

/// Referral records table schema.
#[derive(Iden, Clone, Copy)]
pub enum Referrals {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "code"]
    Code,
    #[iden = "referrer_account_id"]
    ReferrerAccountId,
    #[iden = "referee_account_id"]
    RefereeAccountId,
    #[iden = "status"]
    Status,
    #[iden = "referrer_rewarded"]
    ReferrerRewarded,
    #[iden = "referee_rewarded"]
    RefereeRewarded,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "completed_at"]
    CompletedAt,
}

/// Bulk award idempotency keys table schema.
#[derive(Iden)]
pub enum AwardBatches {
    Table,
    #[iden = "batch_key"]
    BatchKey,
    #[iden = "created_at"]
    CreatedAt,
}

/// SQL for creating the accounts table.
pub const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL,
    program_id TEXT NOT NULL,
    referral_code TEXT NOT NULL UNIQUE,
    current_tier_id TEXT,
    total_points INTEGER NOT NULL DEFAULT 0,
    lifetime_points INTEGER NOT NULL DEFAULT 0,
    total_orders INTEGER NOT NULL DEFAULT 0,
    total_spent_cents INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    joined_at TEXT NOT NULL,
    last_order_at TEXT,
    UNIQUE (customer_id, program_id)
);

CREATE INDEX IF NOT EXISTS idx_accounts_customer ON accounts(customer_id);
"#;

/// SQL for creating the transactions table.
pub const CREATE_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL,
    order_id TEXT,
    kind TEXT NOT NULL,
    points INTEGER NOT NULL,
    reason TEXT,
    balance_after INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id, id);
"#;

/// SQL for creating the tiers table.
pub const CREATE_TIERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tiers (
    id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL,
    name TEXT NOT NULL,
    min_points INTEGER NOT NULL,
    discount_percentage REAL NOT NULL DEFAULT 0,
    free_delivery INTEGER NOT NULL DEFAULT 0,
    priority_support INTEGER NOT NULL DEFAULT 0,
    birthday_reward_points INTEGER NOT NULL DEFAULT 0,
    sort_order INTEGER NOT NULL DEFAULT 0,
    UNIQUE (program_id, name),
    UNIQUE (program_id, min_points)
);
"#;

/// SQL for creating the programs table.
pub const CREATE_PROGRAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS programs (
    id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL UNIQUE,
    points_per_dollar INTEGER NOT NULL DEFAULT 1,
    welcome_bonus_points INTEGER NOT NULL DEFAULT 0,
    referral_bonus_points INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1
);
"#;

/// SQL for creating the referral programs table.
pub const CREATE_REFERRAL_PROGRAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS referral_programs (
    id TEXT PRIMARY KEY,
    store_id TEXT NOT NULL UNIQUE,
    min_order_value_cents INTEGER NOT NULL DEFAULT 0,
    referrer_reward_points INTEGER NOT NULL DEFAULT 0,
    referee_reward_points INTEGER NOT NULL DEFAULT 0,
    max_referrals_per_customer INTEGER NOT NULL DEFAULT 10,
    ttl_days INTEGER NOT NULL DEFAULT 30,
    is_active INTEGER NOT NULL DEFAULT 1
);
"#;

/// SQL for creating the referrals table.
pub const CREATE_REFERRALS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS referrals (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL,
    referrer_account_id TEXT NOT NULL,
    referee_account_id TEXT,
    status TEXT NOT NULL,
    referrer_rewarded INTEGER NOT NULL DEFAULT 0,
    referee_rewarded INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_referrals_referrer ON referrals(referrer_account_id);
CREATE INDEX IF NOT EXISTS idx_referrals_referee ON referrals(referee_account_id);
"#;

/// SQL for creating the award batches table.
pub const CREATE_AWARD_BATCHES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS award_batches (
    batch_key TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);
"#;
