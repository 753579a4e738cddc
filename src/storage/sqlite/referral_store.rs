//! SQLite referral record storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Asterisk, Expr, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{ReferralRecord, ReferralStatus};
use crate::error::{LoyaltyError, Result};
use crate::interfaces::ReferralStore;

use super::super::schema::Referrals;
use super::referral_from_row;

/// SQLite implementation of [`ReferralStore`].
pub struct SqliteReferralStore {
    pool: SqlitePool,
}

impl SqliteReferralStore {
    /// Create a new SQLite referral store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(super::super::schema::CREATE_REFERRALS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Compare-and-set a payout flag from 0 to 1. Returns false when the
    /// flag was already claimed.
    async fn claim_flag(&self, id: Uuid, column: Referrals) -> Result<bool> {
        let update = Query::update()
            .table(Referrals::Table)
            .value(column, 1i64)
            .and_where(Expr::col(Referrals::Id).eq(id.to_string()))
            .and_where(Expr::col(column).eq(0i64))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&update).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl ReferralStore for SqliteReferralStore {
    async fn create(&self, record: &ReferralRecord) -> Result<()> {
        let insert = Query::insert()
            .into_table(Referrals::Table)
            .columns([
                Referrals::Id,
                Referrals::Code,
                Referrals::ReferrerAccountId,
                Referrals::RefereeAccountId,
                Referrals::Status,
                Referrals::ReferrerRewarded,
                Referrals::RefereeRewarded,
                Referrals::CreatedAt,
                Referrals::CompletedAt,
            ])
            .values_panic([
                record.id.to_string().into(),
                record.code.clone().into(),
                record.referrer_account_id.to_string().into(),
                record.referee_account_id.map(|a| a.to_string()).into(),
                record.status.as_str().into(),
                (record.referrer_rewarded as i64).into(),
                (record.referee_rewarded as i64).into(),
                record.created_at.to_rfc3339().into(),
                record.completed_at.map(|t| t.to_rfc3339()).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&insert).execute(&self.pool).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ReferralRecord>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Referrals::Table)
            .and_where(Expr::col(Referrals::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.map(|r| referral_from_row(&r))
            .transpose()
            .map_err(LoyaltyError::from)
    }

    async fn pending_for_referee(&self, referee: Uuid) -> Result<Option<ReferralRecord>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Referrals::Table)
            .and_where(Expr::col(Referrals::RefereeAccountId).eq(referee.to_string()))
            .and_where(Expr::col(Referrals::Status).eq(ReferralStatus::Pending.as_str()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.map(|r| referral_from_row(&r))
            .transpose()
            .map_err(LoyaltyError::from)
    }

    async fn referee_already_referred(&self, referee: Uuid) -> Result<bool> {
        let query = Query::select()
            .column(Referrals::Id)
            .from(Referrals::Table)
            .and_where(Expr::col(Referrals::RefereeAccountId).eq(referee.to_string()))
            .and_where(Expr::col(Referrals::Status).ne(ReferralStatus::Expired.as_str()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }

    async fn settled_count(&self, referrer: Uuid) -> Result<i64> {
        let query = Query::select()
            .expr(Expr::col(Referrals::Id).count())
            .from(Referrals::Table)
            .and_where(Expr::col(Referrals::ReferrerAccountId).eq(referrer.to_string()))
            .and_where(
                Expr::col(Referrals::Status).is_in([
                    ReferralStatus::Completed.as_str(),
                    ReferralStatus::Rewarded.as_str(),
                ]),
            )
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_one(&self.pool).await?;
        let count: i64 = row.get(0);
        Ok(count)
    }

    async fn complete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let update = Query::update()
            .table(Referrals::Table)
            .value(Referrals::Status, ReferralStatus::Completed.as_str())
            .value(Referrals::CompletedAt, at.to_rfc3339())
            .and_where(Expr::col(Referrals::Id).eq(id.to_string()))
            .and_where(Expr::col(Referrals::Status).eq(ReferralStatus::Pending.as_str()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&update).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_rewarded(&self, id: Uuid) -> Result<bool> {
        let update = Query::update()
            .table(Referrals::Table)
            .value(Referrals::Status, ReferralStatus::Rewarded.as_str())
            .and_where(Expr::col(Referrals::Id).eq(id.to_string()))
            .and_where(Expr::col(Referrals::Status).eq(ReferralStatus::Completed.as_str()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&update).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_referrer_rewarded(&self, id: Uuid) -> Result<bool> {
        self.claim_flag(id, Referrals::ReferrerRewarded).await
    }

    async fn mark_referee_rewarded(&self, id: Uuid) -> Result<bool> {
        self.claim_flag(id, Referrals::RefereeRewarded).await
    }

    async fn expire_pending(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let update = Query::update()
            .table(Referrals::Table)
            .value(Referrals::Status, ReferralStatus::Expired.as_str())
            .and_where(Expr::col(Referrals::Status).eq(ReferralStatus::Pending.as_str()))
            .and_where(Expr::col(Referrals::CreatedAt).lt(cutoff.to_rfc3339()))
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&update).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
