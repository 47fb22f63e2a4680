//! The rate-limit backoff window shared by every dispatcher worker.
//!
//! When the accrual service answers `429`, the worker that saw it installs a window with a deadline. Every worker then
//! pauses until that deadline before it sends another request. Once each worker has honored the window, it is cleared
//! and the next rate-limit signal can install a fresh one.
//!
//! The state lives behind a single `std::sync::Mutex`. The lock is only held for bookkeeping and never across an
//! `.await`.
use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::*;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Deadline used when `now + retry_after` cannot be represented.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A worker's view of the active window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowTicket {
    pub generation: u64,
    pub deadline: Instant,
}

#[derive(Debug)]
struct ActiveWindow {
    generation: u64,
    deadline: Instant,
    honored: HashSet<usize>,
}

#[derive(Debug, Default)]
struct WindowState {
    generation: u64,
    active: Option<ActiveWindow>,
}

#[derive(Debug)]
pub struct BackoffWindow {
    workers: usize,
    state: Mutex<WindowState>,
}

impl BackoffWindow {
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1), state: Mutex::new(WindowState::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a window ending `retry_after` from now. Returns `None` and changes nothing if a window is already
    /// active.
    pub fn install(&self, retry_after: Duration) -> Option<WindowTicket> {
        let mut state = self.lock();
        if state.active.is_some() {
            return None;
        }
        let now = Instant::now();
        let deadline = now.checked_add(retry_after).unwrap_or_else(|| now + FAR_FUTURE);
        state.generation += 1;
        let honored = HashSet::with_capacity(self.workers);
        let window = ActiveWindow { generation: state.generation, deadline, honored };
        let ticket = WindowTicket { generation: window.generation, deadline: window.deadline };
        state.active = Some(window);
        Some(ticket)
    }

    /// The active window, if `worker` has not honored it yet.
    pub fn pending_for(&self, worker: usize) -> Option<WindowTicket> {
        let state = self.lock();
        state
            .active
            .as_ref()
            .filter(|w| !w.honored.contains(&worker))
            .map(|w| WindowTicket { generation: w.generation, deadline: w.deadline })
    }

    /// Records that `worker` has waited out window `generation`. Returns `true` if this was the last worker and the
    /// window has been cleared. Tickets for a window that has since been replaced are ignored.
    pub fn mark_honored(&self, worker: usize, generation: u64) -> bool {
        let mut state = self.lock();
        let Some(window) = state.active.as_mut() else {
            return false;
        };
        if window.generation != generation {
            return false;
        }
        window.honored.insert(worker);
        if window.honored.len() >= self.workers {
            state.active = None;
            true
        } else {
            false
        }
    }

    /// The number of windows installed so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Waits out the active window if `worker` still owes it. Returns `false` if `cancel` fired while waiting.
    pub async fn honor(&self, worker: usize, cancel: &CancellationToken) -> bool {
        let Some(ticket) = self.pending_for(worker) else {
            return true;
        };
        trace!("⏳️ Worker {worker} backing off until window {} ends", ticket.generation);
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = sleep_until(ticket.deadline) => {},
        }
        if self.mark_honored(worker, ticket.generation) {
            debug!("⏳️ Every worker has honored backoff window {}. Resuming requests.", ticket.generation);
        }
        true
    }
}
