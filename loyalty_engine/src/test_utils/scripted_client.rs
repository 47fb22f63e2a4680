use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{AccrualClient, AccrualClientError, AccrualOutcome},
    db_types::{AccrualResolution, OrderNumber, OrderStatus, Points},
};

#[derive(Default)]
struct Script {
    outcomes: HashMap<String, VecDeque<AccrualOutcome>>,
    crash_on: HashSet<String>,
    calls: Vec<(OrderNumber, Instant)>,
}

/// An [`AccrualClient`] that plays back scripted outcomes per order and records when each call started.
///
/// Orders without a script resolve to `PROCESSED` with the default accrual.
pub struct ScriptedAccrualClient {
    script: Mutex<Script>,
    default_accrual: Points,
    latency: Duration,
}

impl Default for ScriptedAccrualClient {
    fn default() -> Self {
        Self::new(Points::from_points(10), Duration::ZERO)
    }
}

/// A `PROCESSED` resolution for `order`.
pub fn processed(order: &str, accrual: Points) -> AccrualOutcome {
    AccrualOutcome::Resolved(AccrualResolution::new(order, OrderStatus::Processed, accrual))
}

pub fn rate_limited(retry_after: Duration) -> AccrualOutcome {
    AccrualOutcome::RateLimited { retry_after }
}

pub fn transport_error() -> AccrualOutcome {
    AccrualOutcome::TransportError(AccrualClientError::Connection("connection refused".into()))
}

impl ScriptedAccrualClient {
    pub fn new(default_accrual: Points, latency: Duration) -> Self {
        Self { script: Mutex::new(Script::default()), default_accrual, latency }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `outcome` as the answer to the next unanswered call for `order`.
    pub fn script(&self, order: &str, outcome: AccrualOutcome) -> &Self {
        self.lock().outcomes.entry(order.to_string()).or_default().push_back(outcome);
        self
    }

    /// Makes every call for `order` panic, the way a bug in a real client would take down its worker.
    pub fn crash_on(&self, order: &str) -> &Self {
        self.lock().crash_on.insert(order.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(OrderNumber, Instant)> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, order: &str) -> usize {
        self.lock().calls.iter().filter(|(n, _)| n.as_str() == order).count()
    }

    fn next_outcome(&self, order: &OrderNumber) -> Option<AccrualOutcome> {
        let mut script = self.lock();
        script.calls.push((order.clone(), Instant::now()));
        if script.crash_on.contains(order.as_str()) {
            return None;
        }
        let outcome = script
            .outcomes
            .get_mut(order.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| processed(order.as_str(), self.default_accrual));
        Some(outcome)
    }
}

impl AccrualClient for ScriptedAccrualClient {
    async fn fetch_accrual(&self, order: &OrderNumber, cancel: &CancellationToken) -> AccrualOutcome {
        let Some(outcome) = self.next_outcome(order) else {
            panic!("scripted crash while fetching order {order}");
        };
        if !self.latency.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return AccrualOutcome::TransportError(AccrualClientError::Cancelled),
                _ = tokio::time::sleep(self.latency) => {},
            }
        }
        outcome
    }
}
