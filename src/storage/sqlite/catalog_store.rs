//! SQLite program and tier catalog storage.

use async_trait::async_trait;
use sea_query::{Alias, Asterisk, Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{LoyaltyProgram, LoyaltyTier, ReferralProgram, TierBucket};
use crate::error::{LoyaltyError, Result};
use crate::interfaces::CatalogStore;

use super::super::schema::{Accounts, Programs, ReferralPrograms, Tiers};
use super::{program_from_row, referral_program_from_row, tier_from_row};

/// SQLite implementation of [`CatalogStore`].
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    /// Create a new SQLite catalog store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(super::super::schema::CREATE_PROGRAMS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(super::super::schema::CREATE_TIERS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(super::super::schema::CREATE_REFERRAL_PROGRAMS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn program(&self, id: Uuid) -> Result<Option<LoyaltyProgram>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Programs::Table)
            .and_where(Expr::col(Programs::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.map(|r| program_from_row(&r))
            .transpose()
            .map_err(LoyaltyError::from)
    }

    async fn upsert_program(&self, program: &LoyaltyProgram) -> Result<()> {
        let insert = Query::insert()
            .into_table(Programs::Table)
            .columns([
                Programs::Id,
                Programs::StoreId,
                Programs::PointsPerDollar,
                Programs::WelcomeBonusPoints,
                Programs::ReferralBonusPoints,
                Programs::IsActive,
            ])
            .values_panic([
                program.id.to_string().into(),
                program.store_id.to_string().into(),
                program.points_per_dollar.into(),
                program.welcome_bonus_points.into(),
                program.referral_bonus_points.into(),
                (program.is_active as i64).into(),
            ])
            .on_conflict(
                OnConflict::column(Programs::Id)
                    .update_columns([
                        Programs::StoreId,
                        Programs::PointsPerDollar,
                        Programs::WelcomeBonusPoints,
                        Programs::ReferralBonusPoints,
                        Programs::IsActive,
                    ])
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&insert).execute(&self.pool).await?;
        Ok(())
    }

    async fn tiers(&self, program_id: Uuid) -> Result<Vec<LoyaltyTier>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Tiers::Table)
            .and_where(Expr::col(Tiers::ProgramId).eq(program_id.to_string()))
            .order_by(Tiers::MinPoints, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut tiers = Vec::with_capacity(rows.len());
        for row in rows {
            tiers.push(tier_from_row(&row)?);
        }

        Ok(tiers)
    }

    async fn add_tier(&self, tier: &LoyaltyTier) -> Result<()> {
        // Strictly increasing thresholds and unique names per program.
        let existing = self.tiers(tier.program_id).await?;
        for other in &existing {
            if other.name == tier.name {
                return Err(LoyaltyError::Validation(format!(
                    "tier name '{}' already exists in program",
                    tier.name
                )));
            }
            if other.min_points == tier.min_points {
                return Err(LoyaltyError::Validation(format!(
                    "a tier at {} points already exists in program",
                    tier.min_points
                )));
            }
        }

        let insert = Query::insert()
            .into_table(Tiers::Table)
            .columns([
                Tiers::Id,
                Tiers::ProgramId,
                Tiers::Name,
                Tiers::MinPoints,
                Tiers::DiscountPercentage,
                Tiers::FreeDelivery,
                Tiers::PrioritySupport,
                Tiers::BirthdayRewardPoints,
                Tiers::SortOrder,
            ])
            .values_panic([
                tier.id.to_string().into(),
                tier.program_id.to_string().into(),
                tier.name.clone().into(),
                tier.min_points.into(),
                tier.discount_percentage.into(),
                (tier.free_delivery as i64).into(),
                (tier.priority_support as i64).into(),
                tier.birthday_reward_points.into(),
                tier.sort_order.into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&insert).execute(&self.pool).await?;
        Ok(())
    }

    async fn tier_distribution(&self, program_id: Uuid) -> Result<Vec<TierBucket>> {
        // Server-computed aggregate: count accounts per tier, including
        // accounts whose tier was never resolved (NULL bucket).
        let query = Query::select()
            .column((Accounts::Table, Accounts::CurrentTierId))
            .column((Tiers::Table, Tiers::Name))
            .expr_as(
                Expr::col((Accounts::Table, Accounts::Id)).count(),
                Alias::new("account_count"),
            )
            .from(Accounts::Table)
            .left_join(
                Tiers::Table,
                Expr::col((Accounts::Table, Accounts::CurrentTierId))
                    .equals((Tiers::Table, Tiers::Id)),
            )
            .and_where(Expr::col((Accounts::Table, Accounts::ProgramId)).eq(program_id.to_string()))
            .group_by_col((Accounts::Table, Accounts::CurrentTierId))
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut buckets = Vec::with_capacity(rows.len());
        for row in rows {
            let tier_id: Option<String> = row.get("current_tier_id");
            let tier_id = tier_id
                .map(|t| Uuid::parse_str(&t))
                .transpose()
                .map_err(crate::interfaces::StorageError::from)?;
            buckets.push(TierBucket {
                tier_id,
                tier_name: row.get("name"),
                count: row.get("account_count"),
            });
        }

        Ok(buckets)
    }

    async fn referral_program_for_store(
        &self,
        store_id: Uuid,
    ) -> Result<Option<ReferralProgram>> {
        let query = Query::select()
            .column(Asterisk)
            .from(ReferralPrograms::Table)
            .and_where(Expr::col(ReferralPrograms::StoreId).eq(store_id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.map(|r| referral_program_from_row(&r))
            .transpose()
            .map_err(LoyaltyError::from)
    }

    async fn upsert_referral_program(&self, program: &ReferralProgram) -> Result<()> {
        let insert = Query::insert()
            .into_table(ReferralPrograms::Table)
            .columns([
                ReferralPrograms::Id,
                ReferralPrograms::StoreId,
                ReferralPrograms::MinOrderValueCents,
                ReferralPrograms::ReferrerRewardPoints,
                ReferralPrograms::RefereeRewardPoints,
                ReferralPrograms::MaxReferralsPerCustomer,
                ReferralPrograms::TtlDays,
                ReferralPrograms::IsActive,
            ])
            .values_panic([
                program.id.to_string().into(),
                program.store_id.to_string().into(),
                program.min_order_value_cents.into(),
                program.referrer_reward_points.into(),
                program.referee_reward_points.into(),
                program.max_referrals_per_customer.into(),
                program.ttl_days.into(),
                (program.is_active as i64).into(),
            ])
            .on_conflict(
                OnConflict::column(ReferralPrograms::Id)
                    .update_columns([
                        ReferralPrograms::StoreId,
                        ReferralPrograms::MinOrderValueCents,
                        ReferralPrograms::ReferrerRewardPoints,
                        ReferralPrograms::RefereeRewardPoints,
                        ReferralPrograms::MaxReferralsPerCustomer,
                        ReferralPrograms::TtlDays,
                        ReferralPrograms::IsActive,
                    ])
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        sqlx::query(&insert).execute(&self.pool).await?;
        Ok(())
    }
}
