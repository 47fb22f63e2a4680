use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

use chrono::Utc;
use thiserror::Error;

use crate::{
    db::traits::{AccrualLedger, ApplyOutcome, PendingOrders},
    db_types::{AccrualResolution, Order, OrderNumber, OrderStatus, Points},
};

#[derive(Debug, Clone, Error)]
pub enum MemoryLedgerError {
    #[error("Injected failure: {0}")]
    Injected(String),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
}

#[derive(Default)]
struct LedgerState {
    orders: BTreeMap<String, Order>,
    balances: HashMap<String, Points>,
    apply_failures: HashMap<String, usize>,
}

/// An in-memory [`PendingOrders`] and [`AccrualLedger`] with call counters and failure injection.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    discovery_calls: AtomicUsize,
    apply_calls: AtomicUsize,
    fail_discovery: AtomicBool,
}

/// A freshly uploaded order in the given status.
pub fn order(number: &str, login: &str, status: OrderStatus) -> Order {
    Order {
        number: OrderNumber::from(number),
        user_login: login.to_string(),
        status,
        accrual: None,
        uploaded_at: Utc::now(),
    }
}

impl MemoryLedger {
    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_order(&self, order: Order) {
        self.lock().orders.insert(order.number.as_str().to_string(), order);
    }

    pub fn order(&self, number: &str) -> Option<Order> {
        self.lock().orders.get(number).cloned()
    }

    pub fn balance(&self, login: &str) -> Points {
        self.lock().balances.get(login).copied().unwrap_or_default()
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.fail_discovery.store(fail, Ordering::SeqCst);
    }

    /// The next `count` attempts to apply a resolution for `number` fail.
    pub fn fail_next_applies(&self, number: &str, count: usize) {
        self.lock().apply_failures.insert(number.to_string(), count);
    }
}

impl PendingOrders for MemoryLedger {
    type Error = MemoryLedgerError;

    async fn list_pending_orders(&self) -> Result<Vec<Order>, Self::Error> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_discovery.load(Ordering::SeqCst) {
            return Err(MemoryLedgerError::Injected("discovery".into()));
        }
        let orders = self.lock().orders.values().filter(|o| o.status.is_pending()).cloned().collect();
        Ok(orders)
    }
}

impl AccrualLedger for MemoryLedger {
    type Error = MemoryLedgerError;

    async fn apply_accrual_result(&self, resolution: &AccrualResolution) -> Result<ApplyOutcome, Self::Error> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        let key = resolution.order.as_str();
        if let Some(remaining) = state.apply_failures.get_mut(key).filter(|n| **n > 0) {
            *remaining -= 1;
            return Err(MemoryLedgerError::Injected(format!("apply {}", resolution.order)));
        }
        let order = state.orders.get_mut(key).ok_or_else(|| MemoryLedgerError::OrderNotFound(key.to_string()))?;
        if order.status.is_final() {
            return Ok(ApplyOutcome::AlreadyFinal);
        }
        let credited = resolution.credit();
        order.status = resolution.status;
        order.accrual = resolution.status.credits_balance().then_some(resolution.accrual);
        let owner = order.user_login.clone();
        *state.balances.entry(owner).or_default() += credited;
        Ok(ApplyOutcome::Applied { credited })
    }
}
