use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertOrderResult},
    db_types::{AccrualResolution, NewOrder, Order, OrderNumber, OrderStatus},
};

const ORDER_COLUMNS: &str = "SELECT number, user_login, status, accrual, uploaded_at FROM orders";

/// Stores a new order with status `NEW`. If the order number already exists, nothing is written and the result reports
/// who owns it.
///
/// The insert is attempted first so that, inside a transaction, the write lock is taken before any read.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let inserted = sqlx::query("INSERT INTO orders (number, user_login) VALUES ($1, $2) ON CONFLICT (number) DO NOTHING")
        .bind(order.number.as_str())
        .bind(order.user_login.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if inserted == 1 {
        debug!("🗃️ Order {} saved for {}", order.number, order.user_login);
        return Ok(InsertOrderResult::Inserted);
    }
    let existing = fetch_order_by_number(&order.number, conn)
        .await?
        .ok_or_else(|| SqliteDatabaseError::QueryError(format!("Order {} vanished during insert", order.number)))?;
    if existing.user_login == order.user_login {
        Ok(InsertOrderResult::AlreadyOwned)
    } else {
        Ok(InsertOrderResult::OwnedByAnotherUser)
    }
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SqliteDatabaseError> {
    let order = sqlx::query_as::<_, Order>(&format!("{ORDER_COLUMNS} WHERE number = $1"))
        .bind(number.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_orders_for_user(login: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, SqliteDatabaseError> {
    let orders = sqlx::query_as::<_, Order>(&format!("{ORDER_COLUMNS} WHERE user_login = $1 ORDER BY uploaded_at, rowid"))
        .bind(login)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Fetches every order whose status is one of `statuses`. An empty status list matches nothing.
pub async fn fetch_orders_by_status(
    statuses: &[OrderStatus],
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SqliteDatabaseError> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new(ORDER_COLUMNS);
    builder.push(" WHERE status IN (");
    let mut in_clause = builder.separated(", ");
    for status in statuses {
        in_clause.push_bind(status.as_str());
    }
    builder.push(") ORDER BY uploaded_at, rowid");
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ {} orders with status in {statuses:?}", orders.len());
    Ok(orders)
}

/// Sets the status and accrual of the order in the resolution, but only while the order is still pending.
///
/// Returns the login of the order's owner if the order was updated, or `None` if the order does not exist or is
/// already final.
pub(crate) async fn resolve_pending_order(
    resolution: &AccrualResolution,
    conn: &mut SqliteConnection,
) -> Result<Option<String>, SqliteDatabaseError> {
    let accrual = resolution.status.credits_balance().then_some(resolution.accrual);
    let [new, registered, processing] = OrderStatus::PENDING;
    let owner = sqlx::query_scalar::<_, String>(
        r#"
            UPDATE orders SET status = $1, accrual = $2, updated_at = CURRENT_TIMESTAMP
            WHERE number = $3 AND status IN ($4, $5, $6)
            RETURNING user_login
        "#,
    )
    .bind(resolution.status.as_str())
    .bind(accrual)
    .bind(resolution.order.as_str())
    .bind(new.as_str())
    .bind(registered.as_str())
    .bind(processing.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(owner)
}
