//! Loyalty Engine
//!
//! Users of the loyalty service upload purchase-order numbers and are rewarded with bonus points once an external
//! accrual service has rated the purchase. This library holds the core of that process.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`mod@db`]). SQLite is the supported backend. Callers use the capability traits re-exported at the crate
//!    root rather than the queries themselves. The data types stored in the database live in [`mod@db_types`].
//! 2. Accrual synchronization ([`mod@accrual`]). A producer discovers pending orders, a pool of workers asks the accrual
//!    service about them, and the results are persisted atomically together with the owner's balance credit.
//!
//! The engine also publishes events that can be subscribed to, for example an [`events::OrderAccruedEvent`] whenever an
//! order's accrual has been persisted.
pub mod accrual;
mod db;

pub mod db_types;
pub mod events;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    AccountManagement,
    AccrualLedger,
    ApplyOutcome,
    InsertOrderResult,
    OrderManagement,
    PendingOrders,
};
