//! Internal event bus. The push channel publishes, controllers subscribe.

use tokio::sync::broadcast;

use crate::socket::message::PushEvent;

/// Default broadcast channel capacity.
const DEFAULT_BUS_CAPACITY: usize = 256;

pub struct EventBus {
    tx: broadcast::Sender<PushEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` events behind observe
    /// `RecvError::Lagged`.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: PushEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }
}
