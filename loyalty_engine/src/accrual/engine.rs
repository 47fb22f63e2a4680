use std::sync::Arc;

use log::*;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    accrual::{AccrualClient, Dispatcher, EngineConfig, EngineError, OrderDiscovery},
    db::traits::{AccrualLedger, PendingOrders},
    events::EventProducers,
};

/// `AccrualEngine` wires order discovery to the dispatcher and runs both as one task group.
///
/// The storage backend `B` serves both halves: discovery reads pending orders from it and the workers write resolutions
/// back.
pub struct AccrualEngine<C, B> {
    config: EngineConfig,
    client: Arc<C>,
    db: Arc<B>,
    producers: EventProducers,
}

impl<C, B> AccrualEngine<C, B>
where
    C: AccrualClient + 'static,
    B: PendingOrders + AccrualLedger + Send + Sync + 'static,
{
    pub fn new(config: EngineConfig, client: C, db: B) -> Self {
        Self::from_shared(config, Arc::new(client), Arc::new(db))
    }

    pub fn from_shared(config: EngineConfig, client: Arc<C>, db: Arc<B>) -> Self {
        Self { config, client, db, producers: EventProducers::default() }
    }

    pub fn with_event_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    /// Runs the pipeline until `cancel` fires or one half fails.
    ///
    /// The first failure cancels the other half. `run` returns once both have stopped, with the first error if there
    /// was one. Cancellation is not an error.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), EngineError> {
        let group = cancel.child_token();
        let (sender, receiver) = mpsc::channel(self.config.queue_size());
        info!(
            "🚀️ Accrual engine starting against {} with {} workers",
            self.config.accrual_address,
            self.config.worker_count()
        );

        let discovery = OrderDiscovery::new(Arc::clone(&self.db), self.config.discovery_interval);
        let dispatcher = Dispatcher::new(Arc::clone(&self.client), Arc::clone(&self.db), self.config.worker_count())
            .with_event_producers(self.producers);

        let producer = tokio::spawn(discovery.run(sender, group.clone()));
        let workers = tokio::spawn(dispatcher.run(receiver, group.clone()));

        let (p, d) = tokio::join!(supervise(producer, "order discovery", &group), supervise(workers, "dispatcher", &group));
        let result = p.and(d);
        match &result {
            Ok(()) => info!("🚀️ Accrual engine stopped"),
            Err(e) => error!("🚀️ Accrual engine stopped with an error: {e}"),
        }
        result
    }
}

/// Awaits one half of the engine. If it fails, the whole group is cancelled.
async fn supervise(
    handle: JoinHandle<Result<(), EngineError>>,
    task: &'static str,
    group: &CancellationToken,
) -> Result<(), EngineError> {
    let result = handle.await.unwrap_or_else(|e| Err(EngineError::TaskFailed { task, reason: e.to_string() }));
    if let Err(e) = &result {
        warn!("🚀️ The {task} task failed: {e}. Shutting down the engine.");
        group.cancel();
    }
    result
}
