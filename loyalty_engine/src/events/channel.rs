//! Fire-and-forget delivery of engine events to async callbacks.
//!
//! An [`EventHandler`] owns one bounded queue and one callback. Any number of [`EventProducer`]s feed the queue. The
//! callback sees only the event, never engine state. Once every producer is gone the handler drains what is left,
//! waits for running callbacks and returns.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc::{self, Receiver, Sender},
    task::JoinSet,
};

/// An async callback invoked once per event.
pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    inbox: Receiver<E>,
    outbox: Sender<E>,
    callback: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, callback: Handler<E>) -> Self {
        let (outbox, inbox) = mpsc::channel(buffer_size.max(1));
        Self { inbox, outbox, callback }
    }

    /// A new producer feeding this handler.
    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.outbox.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight callbacks before returning.
    pub async fn start_handler(self) {
        let Self { mut inbox, outbox, callback } = self;
        drop(outbox);
        debug!("📬️ Event handler started");
        let mut running = JoinSet::new();
        while let Some(event) = inbox.recv().await {
            // Reap finished callbacks.
            while let Some(done) = running.try_join_next() {
                report(done);
            }
            running.spawn(callback(event));
        }
        debug!("📬️ All producers are gone. Waiting on {} event callbacks.", running.len());
        while let Some(done) = running.join_next().await {
            report(done);
        }
        debug!("📬️ Event handler stopped");
    }
}

fn report(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        warn!("📬️ An event callback did not finish: {e}");
    }
}

/// The sending side of an [`EventHandler`]. Cheap to clone.
#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    outbox: Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(outbox: Sender<E>) -> Self {
        Self { outbox }
    }

    /// Queues `event`, waiting for space if the handler is behind. A handler that has stopped only costs a log line.
    pub async fn publish_event(&self, event: E) {
        if self.outbox.send(event).await.is_err() {
            warn!("📬️ Event dropped. Its handler is no longer running.");
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::{AtomicI64, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::{
        db_types::{AccrualResolution, OrderStatus, Points},
        events::OrderAccruedEvent,
    };

    fn accrued(order: String, points: i64) -> OrderAccruedEvent {
        let resolution = AccrualResolution::new(order, OrderStatus::Processed, Points::from(points));
        OrderAccruedEvent::new(&resolution, resolution.credit())
    }

    #[tokio::test]
    async fn every_published_event_is_handled() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicI64::new(0));
        let seen = total.clone();
        let callback: Handler<OrderAccruedEvent> = Arc::new(move |ev: OrderAccruedEvent| {
            let total = total.clone();
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                total.fetch_add(ev.credited.value(), Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handler = EventHandler::new(1, callback);
        let first = handler.subscribe();
        let second = handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5 {
                first.publish_event(accrued(format!("a{i}"), i)).await;
            }
        });
        tokio::spawn(async move {
            for i in 5..10 {
                second.publish_event(accrued(format!("b{i}"), i)).await;
            }
        });

        handler.start_handler().await;
        assert_eq!(seen.load(Ordering::SeqCst), 45);
    }

    #[tokio::test]
    async fn publishing_after_shutdown_is_harmless() {
        let callback: Handler<OrderAccruedEvent> =
            Arc::new(|_: OrderAccruedEvent| Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>);
        let handler = EventHandler::new(4, callback);
        let producer = handler.subscribe();
        drop(handler);
        producer.publish_event(accrued("c1".into(), 1)).await;
    }
}
