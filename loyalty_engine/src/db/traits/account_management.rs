use std::future::Future;

use loyalty_common::Points;

use crate::db_types::{OrderNumber, UserBalance, Withdrawal};

/// Users, their balances and their withdrawals.
pub trait AccountManagement {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates a user with a zero balance. Returns `false` if the login is already taken.
    fn create_user(&self, login: &str) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    fn fetch_balance(&self, login: &str) -> impl Future<Output = Result<Option<UserBalance>, Self::Error>> + Send;

    /// Atomically debits `sum` from the user's balance and records the withdrawal against `order`.
    ///
    /// Fails without changing anything if the balance is smaller than `sum`.
    fn withdraw(
        &self,
        login: &str,
        order: &OrderNumber,
        sum: Points,
    ) -> impl Future<Output = Result<UserBalance, Self::Error>> + Send;

    /// All withdrawals made by the user, oldest first.
    fn withdrawals_for_user(&self, login: &str) -> impl Future<Output = Result<Vec<Withdrawal>, Self::Error>> + Send;
}
