//! In-memory collaborators for exercising the accrual engine without a database or an accrual service.
mod memory_ledger;
mod scripted_client;

pub use memory_ledger::{order, MemoryLedger, MemoryLedgerError};
pub use scripted_client::{processed, rate_limited, transport_error, ScriptedAccrualClient};
