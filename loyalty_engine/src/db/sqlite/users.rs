use log::trace;
use loyalty_common::Points;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{OrderNumber, UserBalance, Withdrawal},
};

/// Inserts a user with a zero balance. Returns `false` if the login already exists.
pub async fn insert_user(login: &str, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let inserted = sqlx::query("INSERT INTO users (login) VALUES ($1) ON CONFLICT (login) DO NOTHING")
        .bind(login)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(inserted == 1)
}

pub async fn fetch_balance(login: &str, conn: &mut SqliteConnection) -> Result<Option<UserBalance>, SqliteDatabaseError> {
    let balance = sqlx::query_as::<_, UserBalance>("SELECT balance AS current, withdrawn FROM users WHERE login = $1")
        .bind(login)
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

/// Adds `amount` to the user's balance as a single relative update, so concurrent writers never lose an update.
pub(crate) async fn credit_balance(
    login: &str,
    amount: Points,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let updated =
        sqlx::query("UPDATE users SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE login = $2")
            .bind(amount)
            .bind(login)
            .execute(conn)
            .await?
            .rows_affected();
    if updated == 0 {
        return Err(SqliteDatabaseError::UserNotFound(login.to_string()));
    }
    trace!("🧑️ {login} credited with {amount}");
    Ok(())
}

/// Debits `sum` from the user's balance if, and only if, the balance covers it. The funds check and the update are
/// one statement.
///
/// Returns the new balance, or `None` if the user does not exist or has insufficient funds.
pub(crate) async fn debit_balance(
    login: &str,
    sum: Points,
    conn: &mut SqliteConnection,
) -> Result<Option<UserBalance>, SqliteDatabaseError> {
    let balance = sqlx::query_as::<_, UserBalance>(
        r#"
            UPDATE users
            SET balance = balance - $1, withdrawn = withdrawn + $1, updated_at = CURRENT_TIMESTAMP
            WHERE login = $2 AND balance >= $1
            RETURNING balance AS current, withdrawn
        "#,
    )
    .bind(sum)
    .bind(login)
    .fetch_optional(conn)
    .await?;
    Ok(balance)
}

pub(crate) async fn insert_withdrawal(
    login: &str,
    order: &OrderNumber,
    sum: Points,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("INSERT INTO withdrawals (user_login, order_number, sum) VALUES ($1, $2, $3)")
        .bind(login)
        .bind(order.as_str())
        .bind(sum)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_withdrawals(login: &str, conn: &mut SqliteConnection) -> Result<Vec<Withdrawal>, SqliteDatabaseError> {
    let withdrawals = sqlx::query_as::<_, Withdrawal>(
        r#"
            SELECT order_number AS "order", sum, processed_at
            FROM withdrawals
            WHERE user_login = $1
            ORDER BY processed_at, id
        "#,
    )
    .bind(login)
    .fetch_all(conn)
    .await?;
    Ok(withdrawals)
}
