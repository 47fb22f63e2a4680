//! # Storage capabilities
//!
//! The accrual engine never talks to a concrete database. Each component receives the narrow capability it needs:
//!
//! * [`PendingOrders`] lets the discovery producer find orders that still need a resolution.
//! * [`AccrualLedger`] lets the dispatcher workers persist a resolution, crediting the owner's balance in the same
//!   transaction.
//!
//! The remaining traits describe the storage behaviour the rest of the loyalty service relies on:
//!
//! * [`OrderManagement`] stores uploaded orders and queries them.
//! * [`AccountManagement`] manages users, their balances and withdrawals.
//!
//! Backends must make every balance mutation an atomic read-modify-write, since accrual credits and withdrawals
//! happen concurrently.
mod account_management;
mod accrual_ledger;
mod data_objects;
mod order_management;

pub use account_management::AccountManagement;
pub use accrual_ledger::{AccrualLedger, PendingOrders};
pub use data_objects::{ApplyOutcome, InsertOrderResult};
pub use order_management::OrderManagement;
