//! Delivery of captured selections to the UI side
//!
//! The pipeline and the tap run on their own threads. Consumers registered
//! here are only ever invoked by `UiLoop`, which runs wherever the owner of
//! UI state runs it (the daemon runs it on the main thread).

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::selection::RichTextPayload;

/// Callback receiving captured selections
pub type PopupConsumer = Box<dyn FnMut(RichTextPayload) + Send>;

/// Callback receiving 1-based custom action indices
pub type CustomActionConsumer = Box<dyn FnMut(usize) + Send>;

#[derive(Debug)]
enum Delivery {
    Popup(RichTextPayload),
    CustomAction(usize),
}

#[derive(Default)]
struct Consumers {
    popup: Option<PopupConsumer>,
    custom_action: Option<CustomActionConsumer>,
}

type SharedConsumers = Arc<Mutex<Consumers>>;

fn lock(consumers: &SharedConsumers) -> MutexGuard<'_, Consumers> {
    consumers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sending half: usable from any thread
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
    consumers: SharedConsumers,
}

/// Receiving half: invokes consumers on the thread that drives it
pub struct UiLoop {
    rx: mpsc::UnboundedReceiver<Delivery>,
    consumers: SharedConsumers,
}

/// Create a connected dispatcher and UI loop
pub fn channel() -> (Dispatcher, UiLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    let consumers = SharedConsumers::default();
    (
        Dispatcher {
            tx,
            consumers: Arc::clone(&consumers),
        },
        UiLoop { rx, consumers },
    )
}

impl Dispatcher {
    /// Register the popup consumer, replacing any previous one
    pub fn on_popup_hotkey(&self, consumer: impl FnMut(RichTextPayload) + Send + 'static) {
        lock(&self.consumers).popup = Some(Box::new(consumer));
    }

    /// Register the custom action consumer, replacing any previous one
    pub fn on_custom_action_hotkey(&self, consumer: impl FnMut(usize) + Send + 'static) {
        lock(&self.consumers).custom_action = Some(Box::new(consumer));
    }

    /// Queue a payload for the popup consumer
    pub fn deliver(&self, payload: RichTextPayload) {
        self.send(Delivery::Popup(payload));
    }

    /// Queue a custom action index for its consumer
    pub fn deliver_custom_action(&self, index: usize) {
        self.send(Delivery::CustomAction(index));
    }

    fn send(&self, delivery: Delivery) {
        if self.tx.send(delivery).is_err() {
            debug!("UI loop gone, delivery dropped");
        }
    }
}

impl UiLoop {
    /// Deliver until every dispatcher is dropped
    pub async fn run(mut self) {
        while let Some(delivery) = self.rx.recv().await {
            self.invoke(delivery);
        }
        debug!("UI loop finished");
    }

    /// Deliver everything already queued without waiting; returns the count
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            self.invoke(delivery);
            delivered += 1;
        }
        delivered
    }

    fn invoke(&self, delivery: Delivery) {
        // The consumer is taken out while it runs so it may re-register
        match delivery {
            Delivery::Popup(payload) => {
                let Some(mut consumer) = lock(&self.consumers).popup.take() else {
                    trace!("no popup consumer, payload dropped");
                    return;
                };
                consumer(payload);
                let mut consumers = lock(&self.consumers);
                if consumers.popup.is_none() {
                    consumers.popup = Some(consumer);
                }
            }
            Delivery::CustomAction(index) => {
                let Some(mut consumer) = lock(&self.consumers).custom_action.take() else {
                    trace!(index, "no custom action consumer, index dropped");
                    return;
                };
                consumer(index);
                let mut consumers = lock(&self.consumers);
                if consumers.custom_action.is_none() {
                    consumers.custom_action = Some(consumer);
                }
            }
        }
    }
}
