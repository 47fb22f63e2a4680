//! Order discovery.
//!
//! [`OrderDiscovery`] repeatedly asks storage for every pending order and feeds them into the dispatcher queue, one
//! every `discovery_interval`. It is the only writer of the queue. Orders that are still pending after a failed or
//! inconclusive attempt are simply picked up again on the next pass.
use std::{sync::Arc, time::Duration};

use log::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{accrual::EngineError, db::traits::PendingOrders, db_types::Order};

pub struct OrderDiscovery<P> {
    source: Arc<P>,
    interval: Duration,
}

impl<P> OrderDiscovery<P>
where P: PendingOrders
{
    pub fn new(source: Arc<P>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Runs discovery passes until `cancel` fires or the storage query fails.
    ///
    /// The queue is closed when this returns, since `queue` is dropped. A failing query is the only error, and it is
    /// fatal to the engine.
    pub async fn run(self, queue: mpsc::Sender<Order>, cancel: CancellationToken) -> Result<(), EngineError> {
        info!("🔍️ Order discovery started. Pacing: {:?}", self.interval);
        let mut pass = 0u64;
        loop {
            pass += 1;
            let orders = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.source.list_pending_orders() => result.map_err(|e| {
                    error!("🔍️ Could not fetch pending orders: {e}");
                    EngineError::Discovery(e.to_string())
                })?,
            };
            trace!("🔍️ Discovery pass {pass} found {} pending orders", orders.len());
            if orders.is_empty() && !self.pause(&cancel).await {
                break;
            }
            for order in orders {
                if !self.pause(&cancel).await {
                    break;
                }
                let sent = tokio::select! {
                    _ = cancel.cancelled() => false,
                    result = queue.send(order) => result.is_ok(),
                };
                if !sent {
                    break;
                }
            }
            if cancel.is_cancelled() || queue.is_closed() {
                break;
            }
        }
        info!("🔍️ Order discovery stopped after {pass} passes");
        Ok(())
    }

    /// Sleeps for one interval. Returns `false` if `cancel` fired first.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.interval) => true,
        }
    }
}
