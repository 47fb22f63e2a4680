//! The dispatcher owns a fixed pool of workers that drain the order queue.
//!
//! Each worker iteration:
//! 1. honors the backoff window if one is active and this worker has not waited it out yet,
//! 2. takes the next order from the queue,
//! 3. honors any window that opened while it was waiting for the queue,
//! 4. asks the accrual service about the order and acts on the [`AccrualOutcome`].
//!
//! Nothing a worker does with a single order is fatal. Failed orders stay pending and come back on the next discovery
//! pass.
use std::sync::Arc;

use log::*;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{AccrualClient, AccrualClientError, AccrualOutcome, BackoffWindow, EngineError},
    db::traits::AccrualLedger,
    db_types::{AccrualResolution, Order},
    events::{EventProducers, OrderAccruedEvent},
};

type SharedQueue = Arc<Mutex<mpsc::Receiver<Order>>>;

pub struct Dispatcher<C, L> {
    client: Arc<C>,
    ledger: Arc<L>,
    workers: usize,
    backoff: Arc<BackoffWindow>,
    producers: EventProducers,
}

impl<C, L> Dispatcher<C, L>
where
    C: AccrualClient + 'static,
    L: AccrualLedger + Send + Sync + 'static,
{
    pub fn new(client: Arc<C>, ledger: Arc<L>, workers: usize) -> Self {
        let workers = workers.max(1);
        let backoff = Arc::new(BackoffWindow::new(workers));
        Self { client, ledger, workers, backoff, producers: EventProducers::default() }
    }

    pub fn with_event_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn backoff(&self) -> Arc<BackoffWindow> {
        Arc::clone(&self.backoff)
    }

    /// Runs the worker pool until the queue is closed and drained, or `cancel` fires.
    ///
    /// A worker can only fail by panicking. Whichever worker fails first cancels `cancel`, so the rest of the pipeline
    /// shuts down too, and its error is returned once every worker has stopped.
    pub async fn run(self, queue: mpsc::Receiver<Order>, cancel: CancellationToken) -> Result<(), EngineError> {
        info!("🔄️ Starting {} accrual workers", self.workers);
        let queue: SharedQueue = Arc::new(Mutex::new(queue));
        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let worker = Worker {
                id,
                client: Arc::clone(&self.client),
                ledger: Arc::clone(&self.ledger),
                backoff: Arc::clone(&self.backoff),
                producers: self.producers.clone(),
                queue: Arc::clone(&queue),
            };
            workers.spawn(worker.run(cancel.clone()));
        }
        let mut result = Ok(());
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("🔄️ An accrual worker failed: {e}");
                cancel.cancel();
                if result.is_ok() {
                    result = Err(EngineError::TaskFailed { task: "accrual worker", reason: e.to_string() });
                }
            }
        }
        info!("🔄️ All accrual workers have stopped");
        result
    }
}

struct Worker<C, L> {
    id: usize,
    client: Arc<C>,
    ledger: Arc<L>,
    backoff: Arc<BackoffWindow>,
    producers: EventProducers,
    queue: SharedQueue,
}

impl<C, L> Worker<C, L>
where
    C: AccrualClient,
    L: AccrualLedger + Send + Sync,
{
    async fn run(self, cancel: CancellationToken) {
        debug!("🔄️ Worker {} started", self.id);
        loop {
            if cancel.is_cancelled() || !self.backoff.honor(self.id, &cancel).await {
                break;
            }
            let next = tokio::select! {
                _ = cancel.cancelled() => None,
                order = self.next_order() => order,
            };
            let Some(order) = next else {
                break;
            };
            if !self.backoff.honor(self.id, &cancel).await {
                break;
            }
            self.process(order, &cancel).await;
        }
        debug!("🔄️ Worker {} stopped", self.id);
    }

    async fn next_order(&self) -> Option<Order> {
        self.queue.lock().await.recv().await
    }

    async fn process(&self, order: Order, cancel: &CancellationToken) {
        trace!("🔄️ Worker {} fetching accrual for order {}", self.id, order.number);
        match self.client.fetch_accrual(&order.number, cancel).await {
            AccrualOutcome::Resolved(resolution) => self.save(resolution).await,
            AccrualOutcome::NotRegistered => {
                debug!("🔄️ Order {} is not registered with the accrual service yet", order.number);
            },
            AccrualOutcome::RateLimited { retry_after } => match self.backoff.install(retry_after) {
                Some(window) => {
                    warn!(
                        "🔄️ Accrual service is rate limiting us. All workers pause for {retry_after:?} (window {})",
                        window.generation
                    );
                },
                None => trace!("🔄️ Rate limited on order {}, but a backoff window is already active", order.number),
            },
            AccrualOutcome::TransportError(AccrualClientError::Cancelled) => {
                debug!("🔄️ Accrual request for order {} was cancelled", order.number);
            },
            AccrualOutcome::TransportError(e) => {
                warn!("🔄️ Could not fetch accrual for order {}: {e}", order.number);
            },
        }
    }

    async fn save(&self, resolution: AccrualResolution) {
        match self.ledger.apply_accrual_result(&resolution).await {
            Ok(outcome) => match OrderAccruedEvent::from_outcome(&resolution, outcome) {
                Some(event) => {
                    info!("🔄️ Order {} is {}. {} credited.", event.order, event.status, event.credited);
                    self.producers.publish_order_accrued(event).await;
                },
                None => debug!("🔄️ Order {} was already final. Nothing to do.", resolution.order),
            },
            Err(e) => error!("🔄️ Could not save the accrual result for order {}: {e}", resolution.order),
        }
    }
}
