use std::{future::Future, pin::Pin, sync::Arc};

use tokio::task::JoinHandle;

use crate::events::{EventHandler, EventProducer, Handler, OrderAccruedEvent};

/// Callbacks to run when the engine emits an event. Unset hooks cost nothing.
#[derive(Default, Clone)]
pub struct EventHooks {
    order_accrued: Option<Handler<OrderAccruedEvent>>,
}

impl EventHooks {
    pub fn on_order_accrued<F>(mut self, f: F) -> Self
    where F: Fn(OrderAccruedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.order_accrued = Some(Arc::new(f));
        self
    }
}

/// The running side of a set of [`EventHooks`].
pub struct EventHandlers {
    order_accrued: Option<EventHandler<OrderAccruedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self { order_accrued: hooks.order_accrued.map(|callback| EventHandler::new(buffer_size, callback)) }
    }

    pub fn producers(&self) -> EventProducers {
        let mut producers = EventProducers::default();
        if let Some(handler) = &self.order_accrued {
            producers.add_order_accrued(handler.subscribe());
        }
        producers
    }

    /// Spawns a task per configured hook. Each task ends once every producer handed out by [`Self::producers`] is
    /// dropped.
    pub fn start_handlers(self) -> Vec<JoinHandle<()>> {
        self.order_accrued.into_iter().map(|handler| tokio::spawn(handler.start_handler())).collect()
    }
}

/// Where the engine publishes its events.
#[derive(Default, Clone)]
pub struct EventProducers {
    order_accrued: Vec<EventProducer<OrderAccruedEvent>>,
}

impl EventProducers {
    pub fn add_order_accrued(&mut self, producer: EventProducer<OrderAccruedEvent>) -> &mut Self {
        self.order_accrued.push(producer);
        self
    }

    pub async fn publish_order_accrued(&self, event: OrderAccruedEvent) {
        for producer in &self.order_accrued {
            producer.publish_event(event.clone()).await;
        }
    }
}
