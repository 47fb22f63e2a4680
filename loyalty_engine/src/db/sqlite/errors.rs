use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("User {login} cannot withdraw {requested}. Current balance is {available}")]
    InsufficientFunds { login: String, requested: String, available: String },
}
