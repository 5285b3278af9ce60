use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::trace;

use crate::records::LedgerEvent;

/// Receiver of ledger notifications.
///
/// `publish` is called while the ledger's write lock is held, so
/// implementations must return promptly and must not call back into the
/// ledger.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &LedgerEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn publish(&self, _event: &LedgerEvent) {}
}

/// Keeps every published event in memory, in publication order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &LedgerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// A broadcast channel receiver for ledger events.
pub type EventStream = broadcast::Receiver<LedgerEvent>;

/// Fan-out sink delivering every event to all current subscribers.
///
/// Sending never blocks; subscribers that fall more than `capacity` events
/// behind observe `RecvError::Lagged`.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    sender: broadcast::Sender<LedgerEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventStream {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &LedgerEvent) {
        // An error only means nobody is listening right now.
        if self.sender.send(event.clone()).is_err() {
            trace!(kind = %event.kind(), "no subscribers for ledger event");
        }
    }
}
