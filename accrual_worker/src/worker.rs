use std::{future::Future, time::Duration};

use log::*;
use loyalty_engine::{
    accrual::{AccrualClient, AccrualEngine, EngineError, HttpAccrualClient},
    events::{EventHandlers, EventHooks, OrderAccruedEvent},
    AccrualLedger,
    PendingOrders,
    SqliteDatabase,
};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{config::WorkerConfig, errors::WorkerError};

const EVENT_BUFFER_SIZE: usize = 64;

/// Runs the accrual worker until Ctrl-C is pressed or the engine fails.
pub async fn run_worker(config: WorkerConfig) -> Result<(), WorkerError> {
    run_worker_until(config, ctrl_c()).await
}

/// Opens the database, applies migrations if configured to, and runs the accrual engine until `shutdown` resolves.
pub async fn run_worker_until<S>(config: WorkerConfig, shutdown: S) -> Result<(), WorkerError>
where S: Future<Output = ()> {
    let db = SqliteDatabase::new_with_url(config.database_url.reveal(), config.max_connections)
        .await
        .map_err(|e| WorkerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.run_migrations().await.map_err(|e| WorkerError::InitializeError(e.to_string()))?;
    }
    let client = HttpAccrualClient::new(&config.engine).map_err(|e| WorkerError::ConfigurationError(e.to_string()))?;

    let engine = AccrualEngine::new(config.engine.clone(), client, db.clone());
    let result = run_with_event_hooks(engine, event_hooks(), shutdown, config.shutdown_timeout).await;
    db.close().await;
    result
}

/// Runs `engine` with `hooks` subscribed to its events until `shutdown` resolves.
///
/// Once the engine has stopped, the hooks get up to `timeout` to work through the events still queued for them.
pub async fn run_with_event_hooks<C, B, S>(
    engine: AccrualEngine<C, B>,
    hooks: EventHooks,
    shutdown: S,
    timeout: Duration,
) -> Result<(), WorkerError>
where
    C: AccrualClient + 'static,
    B: PendingOrders + AccrualLedger + Send + Sync + 'static,
    S: Future<Output = ()>,
{
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let engine = engine.with_event_producers(handlers.producers());
    let handler_tasks = handlers.start_handlers();
    let result = run_until_shutdown(engine, shutdown, timeout).await;
    drain_event_handlers(handler_tasks, timeout).await;
    result
}

async fn drain_event_handlers(tasks: Vec<JoinHandle<()>>, timeout: Duration) {
    let drain = async {
        for task in tasks {
            if let Err(e) = task.await {
                warn!("🔔️ An event handler failed: {e}");
            }
        }
    };
    match tokio::time::timeout(timeout, drain).await {
        Ok(()) => debug!("🔔️ Event handlers have drained"),
        Err(_) => warn!("🔔️ Event handlers did not drain within {timeout:?}. Remaining events are dropped."),
    }
}

fn event_hooks() -> EventHooks {
    EventHooks::default().on_order_accrued(|ev: OrderAccruedEvent| {
        Box::pin(async move {
            info!("🔔️ Order {} reached {}. {} points credited.", ev.order, ev.status, ev.credited);
        })
    })
}

/// Runs `engine` until it stops on its own or `shutdown` resolves. On shutdown the engine is cancelled and given
/// `timeout` to finish.
pub async fn run_until_shutdown<C, B, S>(
    engine: AccrualEngine<C, B>,
    shutdown: S,
    timeout: Duration,
) -> Result<(), WorkerError>
where
    C: AccrualClient + 'static,
    B: PendingOrders + AccrualLedger + Send + Sync + 'static,
    S: Future<Output = ()>,
{
    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn(engine.run(cancel.clone()));
    tokio::select! {
        result = &mut handle => return engine_result(result),
        _ = shutdown => info!("🛑️ Shutdown requested. Stopping the accrual engine."),
    }
    cancel.cancel();
    match tokio::time::timeout(timeout, handle).await {
        Ok(result) => {
            info!("🛑️ Accrual engine has shut down");
            engine_result(result)
        },
        Err(_) => {
            error!("🛑️ The accrual engine did not stop within {timeout:?}");
            Err(WorkerError::ShutdownTimeout(timeout))
        },
    }
}

fn engine_result(result: Result<Result<(), EngineError>, JoinError>) -> Result<(), WorkerError> {
    let result =
        result.map_err(|e| EngineError::TaskFailed { task: "accrual engine", reason: e.to_string() })?;
    Ok(result?)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("🛑️ Could not listen for Ctrl-C. The worker can only be stopped by killing it. {e}");
        std::future::pending::<()>().await;
    }
}
