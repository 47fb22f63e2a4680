//! `SqliteDatabase` is the concrete storage backend for the loyalty service.
//!
//! Every mutating transaction starts with its write statement. SQLite allows a single writer at a time, so the first
//! write takes the database lock and the accrual and withdrawal paths are serialized, much like a row lock taken with
//! `SELECT ... FOR UPDATE` on other engines.
use std::fmt::Debug;

use log::*;
use loyalty_common::Points;
use sqlx::SqlitePool;

use super::{new_pool, orders, users, SqliteDatabaseError};
use crate::{
    db::traits::{AccountManagement, AccrualLedger, ApplyOutcome, InsertOrderResult, OrderManagement, PendingOrders},
    db_types::{AccrualResolution, NewOrder, Order, OrderNumber, OrderStatus, UserBalance, Withdrawal},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Opens a connection pool on `url`, creating the database file if it does not exist yet.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { pool })
    }

    /// Brings the schema up to date with the migrations embedded in this crate.
    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl PendingOrders for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn list_pending_orders(&self) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_by_status(&OrderStatus::PENDING, &mut conn).await
    }
}

impl AccrualLedger for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn apply_accrual_result(&self, resolution: &AccrualResolution) -> Result<ApplyOutcome, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let owner = match orders::resolve_pending_order(resolution, &mut tx).await? {
            Some(owner) => owner,
            None => {
                let existing = orders::fetch_order_by_number(&resolution.order, &mut tx).await?;
                tx.rollback().await?;
                return match existing {
                    Some(order) => {
                        debug!(
                            "🗃️ Order {} is already {}. Resolution to {} ignored.",
                            order.number, order.status, resolution.status
                        );
                        Ok(ApplyOutcome::AlreadyFinal)
                    },
                    None => Err(SqliteDatabaseError::OrderNotFound(resolution.order.to_string())),
                };
            },
        };
        let credited = resolution.credit();
        if credited > Points::default() {
            users::credit_balance(&owner, credited, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order {} is now {}. {credited} credited to {owner}", resolution.order, resolution.status);
        Ok(ApplyOutcome::Applied { credited })
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_order(&self, order: NewOrder) -> Result<InsertOrderResult, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::idempotent_insert(order, &mut conn).await
    }

    async fn order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_number(number, &mut conn).await
    }

    async fn orders_for_user(&self, login: &str) -> Result<Vec<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_user(login, &mut conn).await
    }
}

impl AccountManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn create_user(&self, login: &str) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(login, &mut conn).await
    }

    async fn fetch_balance(&self, login: &str) -> Result<Option<UserBalance>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_balance(login, &mut conn).await
    }

    /// Takes a withdrawal, and in a single atomic transaction,
    /// * debits the balance if it covers the sum, adding the sum to the withdrawn total,
    /// * records the withdrawal.
    async fn withdraw(&self, login: &str, order: &OrderNumber, sum: Points) -> Result<UserBalance, Self::Error> {
        if sum <= Points::default() {
            return Err(SqliteDatabaseError::QueryError(format!("Withdrawal sum must be positive, got {sum}")));
        }
        let mut tx = self.pool.begin().await?;
        let balance = match users::debit_balance(login, sum, &mut tx).await? {
            Some(balance) => balance,
            None => {
                let available = users::fetch_balance(login, &mut tx).await?;
                tx.rollback().await?;
                let available = available.ok_or_else(|| SqliteDatabaseError::UserNotFound(login.to_string()))?;
                return Err(SqliteDatabaseError::InsufficientFunds {
                    login: login.to_string(),
                    requested: sum.to_string(),
                    available: available.current.to_string(),
                });
            },
        };
        users::insert_withdrawal(login, order, sum, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {login} withdrew {sum} against order {order}. Balance is now {}", balance.current);
        Ok(balance)
    }

    async fn withdrawals_for_user(&self, login: &str) -> Result<Vec<Withdrawal>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_withdrawals(login, &mut conn).await
    }
}
