//! # Accrual synchronization
//!
//! Orders uploaded by users start out `NEW`. The accrual engine keeps asking the external accrual service about every
//! pending order until it reaches a final status, and persists each answer together with the balance credit it
//! implies.
//!
//! ```text
//!   OrderDiscovery ──> bounded queue ──> Dispatcher (N workers) ──> AccrualClient
//!                                              │    ▲
//!                                              ▼    └── BackoffWindow (shared by every worker)
//!                                        AccrualLedger
//! ```
//!
//! * [`OrderDiscovery`] polls storage for pending orders and feeds the queue at a steady pace.
//! * [`Dispatcher`] runs the worker pool. When the accrual service rate-limits any worker, the [`BackoffWindow`]
//!   pauses all of them.
//! * [`AccrualEngine`] runs both halves under one cancellation token. If either half fails, the other is stopped.
mod backoff;
mod client;
mod config;
mod dispatcher;
mod engine;
mod errors;
mod producer;

pub use backoff::{BackoffWindow, WindowTicket};
pub use client::{AccrualClient, AccrualOutcome, HttpAccrualClient};
pub use config::*;
pub use dispatcher::Dispatcher;
pub use engine::AccrualEngine;
pub use errors::{AccrualClientError, EngineError};
pub use producer::OrderDiscovery;
