//! SQLite ledger and account storage.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Asterisk, Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::{Acquire, SqlitePool};
use uuid::Uuid;

use crate::domain::{LoyaltyAccount, LoyaltyTransaction};
use crate::error::{LoyaltyError, Result};
use crate::interfaces::{AppendOutcome, AppendRequest, LedgerStore, NewAccount};
use crate::projection::{self, Balances};

use super::super::schema::{Accounts, AwardBatches, Transactions};
use super::{account_from_row, transaction_from_row};

/// SQLite implementation of [`LedgerStore`].
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new SQLite ledger store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(super::super::schema::CREATE_ACCOUNTS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(super::super::schema::CREATE_TRANSACTIONS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(super::super::schema::CREATE_AWARD_BATCHES_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Query builders hold non-Send internals, so SQL is rendered to a
    // string before anything awaits.
    fn account_select(
        conditions: impl IntoIterator<Item = sea_query::SimpleExpr>,
    ) -> String {
        let mut select = Query::select();
        select
            .column(Asterisk)
            .from(Accounts::Table)
            .order_by(Accounts::JoinedAt, Order::Asc);
        for condition in conditions {
            select.and_where(condition);
        }
        select.to_string(SqliteQueryBuilder)
    }

    async fn fetch_account(&self, query: String) -> Result<Option<LoyaltyAccount>> {
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.map(|r| account_from_row(&r))
            .transpose()
            .map_err(LoyaltyError::from)
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn append(&self, req: AppendRequest) -> Result<AppendOutcome> {
        let account_id = req.account_id.to_string();

        // One transaction for the validate/insert/project sequence: the
        // ledger row and the balance update commit or fail together.
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let select = Query::select()
            .column(Asterisk)
            .from(Accounts::Table)
            .and_where(Expr::col(Accounts::Id).eq(&account_id))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&select).fetch_optional(&mut *tx).await?;
        let Some(row) = row else {
            return Err(LoyaltyError::UnknownAccount(req.account_id));
        };
        let mut account = account_from_row(&row)?;

        if !account.is_active {
            return Err(LoyaltyError::InactiveAccount(account.id));
        }
        if req.points < 0
            && !req.allow_negative_balance
            && account.total_points + req.points < 0
        {
            return Err(LoyaltyError::InsufficientBalance {
                available: account.total_points,
                requested: -req.points,
            });
        }

        let balances = projection::apply(
            Balances {
                total_points: account.total_points,
                lifetime_points: account.lifetime_points,
            },
            req.points,
            req.kind,
        );

        let now = Utc::now();
        let created_at = now.to_rfc3339();

        let insert = Query::insert()
            .into_table(Transactions::Table)
            .columns([
                Transactions::AccountId,
                Transactions::OrderId,
                Transactions::Kind,
                Transactions::Points,
                Transactions::Reason,
                Transactions::BalanceAfter,
                Transactions::CreatedAt,
            ])
            .values_panic([
                account_id.clone().into(),
                req.order_id.map(|o| o.to_string()).into(),
                req.kind.as_str().into(),
                req.points.into(),
                req.reason.clone().into(),
                balances.total_points.into(),
                created_at.clone().into(),
            ])
            .to_string(SqliteQueryBuilder);

        let inserted = sqlx::query(&insert).execute(&mut *tx).await?;
        let transaction_id = inserted.last_insert_rowid();

        let update = {
            let mut update = Query::update();
            update
                .table(Accounts::Table)
                .value(Accounts::TotalPoints, balances.total_points)
                .value(Accounts::LifetimePoints, balances.lifetime_points)
                .and_where(Expr::col(Accounts::Id).eq(&account_id));

            if let Some(order_total) = req.order_total_cents {
                account.total_orders += 1;
                account.total_spent_cents += order_total;
                account.last_order_at = Some(now);
                update
                    .value(Accounts::TotalOrders, account.total_orders)
                    .value(Accounts::TotalSpentCents, account.total_spent_cents)
                    .value(Accounts::LastOrderAt, created_at.clone());
            }

            update.to_string(SqliteQueryBuilder)
        };

        sqlx::query(&update).execute(&mut *tx).await?;

        tx.commit().await?;

        account.total_points = balances.total_points;
        account.lifetime_points = balances.lifetime_points;

        Ok(AppendOutcome {
            transaction: LoyaltyTransaction {
                id: transaction_id,
                account_id: req.account_id,
                order_id: req.order_id,
                kind: req.kind,
                points: req.points,
                reason: req.reason,
                balance_after: balances.total_points,
                created_at: now,
            },
            account,
        })
    }

    async fn create_account(&self, new: NewAccount) -> Result<LoyaltyAccount> {
        let id = Uuid::new_v4();
        let joined_at = Utc::now();

        let insert = Query::insert()
            .into_table(Accounts::Table)
            .columns([
                Accounts::Id,
                Accounts::CustomerId,
                Accounts::ProgramId,
                Accounts::ReferralCode,
                Accounts::CurrentTierId,
                Accounts::TotalPoints,
                Accounts::LifetimePoints,
                Accounts::TotalOrders,
                Accounts::TotalSpentCents,
                Accounts::IsActive,
                Accounts::JoinedAt,
            ])
            .values_panic([
                id.to_string().into(),
                new.customer_id.to_string().into(),
                new.program_id.to_string().into(),
                new.referral_code.clone().into(),
                new.current_tier_id.map(|t| t.to_string()).into(),
                0i64.into(),
                0i64.into(),
                0i64.into(),
                0i64.into(),
                1i64.into(),
                joined_at.to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&insert).execute(&self.pool).await?;

        Ok(LoyaltyAccount {
            id,
            customer_id: new.customer_id,
            program_id: new.program_id,
            referral_code: new.referral_code,
            current_tier_id: new.current_tier_id,
            total_points: 0,
            lifetime_points: 0,
            total_orders: 0,
            total_spent_cents: 0,
            is_active: true,
            joined_at,
            last_order_at: None,
        })
    }

    async fn account(&self, id: Uuid) -> Result<Option<LoyaltyAccount>> {
        let query = Self::account_select([Expr::col(Accounts::Id).eq(id.to_string())]);
        self.fetch_account(query).await
    }

    async fn account_by_customer(
        &self,
        customer_id: Uuid,
        program_id: Uuid,
    ) -> Result<Option<LoyaltyAccount>> {
        let query = Self::account_select([
            Expr::col(Accounts::CustomerId).eq(customer_id.to_string()),
            Expr::col(Accounts::ProgramId).eq(program_id.to_string()),
        ]);
        self.fetch_account(query).await
    }

    async fn account_for_customer(&self, customer_id: Uuid) -> Result<Option<LoyaltyAccount>> {
        let query =
            Self::account_select([Expr::col(Accounts::CustomerId).eq(customer_id.to_string())]);
        self.fetch_account(query).await
    }

    async fn account_by_referral_code(&self, code: &str) -> Result<Option<LoyaltyAccount>> {
        let query = Self::account_select([Expr::col(Accounts::ReferralCode).eq(code)]);
        self.fetch_account(query).await
    }

    async fn update_tier(&self, account_id: Uuid, tier_id: Uuid) -> Result<()> {
        let update = Query::update()
            .table(Accounts::Table)
            .value(Accounts::CurrentTierId, tier_id.to_string())
            .and_where(Expr::col(Accounts::Id).eq(account_id.to_string()))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&update).execute(&self.pool).await?;
        Ok(())
    }

    async fn history(
        &self,
        account_id: Uuid,
        limit: u32,
        before_id: Option<i64>,
    ) -> Result<Vec<LoyaltyTransaction>> {
        let query = {
            let mut select = Query::select();
            select
                .column(Asterisk)
                .from(Transactions::Table)
                .and_where(Expr::col(Transactions::AccountId).eq(account_id.to_string()))
                .order_by(Transactions::Id, Order::Desc)
                .limit(limit as u64);

            if let Some(before) = before_id {
                select.and_where(Expr::col(Transactions::Id).lt(before));
            }

            select.to_string(SqliteQueryBuilder)
        };

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            transactions.push(transaction_from_row(&row)?);
        }

        Ok(transactions)
    }

    async fn full_history(&self, account_id: Uuid) -> Result<Vec<LoyaltyTransaction>> {
        let select = Query::select()
            .column(Asterisk)
            .from(Transactions::Table)
            .and_where(Expr::col(Transactions::AccountId).eq(account_id.to_string()))
            .order_by(Transactions::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&select).fetch_all(&self.pool).await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            transactions.push(transaction_from_row(&row)?);
        }

        Ok(transactions)
    }

    async fn register_batch(&self, key: &str) -> Result<bool> {
        let insert = Query::insert()
            .into_table(AwardBatches::Table)
            .columns([AwardBatches::BatchKey, AwardBatches::CreatedAt])
            .values_panic([key.into(), Utc::now().to_rfc3339().into()])
            .on_conflict(
                OnConflict::column(AwardBatches::BatchKey)
                    .do_nothing()
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&insert).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
