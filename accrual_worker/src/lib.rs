//! # Accrual worker
//!
//! A daemon that runs the loyalty accrual engine against a SQLite database. It
//! * loads its configuration from the environment (see [`config`]),
//! * opens the database and applies the embedded migrations,
//! * runs the accrual engine until Ctrl-C, then shuts it down within a bounded time.
//!
//! Every persisted accrual result is logged through an order-accrued event hook.
pub mod cli;
pub mod config;
pub mod errors;
pub mod worker;
