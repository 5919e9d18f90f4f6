//! Per-session event fan-out.
//!
//! Each subscriber owns a bounded channel. Publishing never waits: a full
//! subscriber misses the event, a closed one is evicted.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::events::SessionEvent;

pub type SubscriberId = u64;

pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Arc<SessionEvent>>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Arc<SessionEvent>> {
        self.receiver.recv().await
    }
}

struct Subscribers {
    next_id: SubscriberId,
    senders: HashMap<SubscriberId, mpsc::Sender<Arc<SessionEvent>>>,
    closed: bool,
}

pub struct EventBus {
    capacity: usize,
    inner: Mutex<Subscribers>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        EventBus {
            capacity: capacity.max(1),
            inner: Mutex::new(Subscribers {
                next_id: 0,
                senders: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Register a listener. Subscribing to a closed bus yields a receiver
    /// that is already at end of stream.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        if !inner.closed {
            inner.senders.insert(id, tx);
        }
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.lock().senders.remove(&id).is_some()
    }

    /// Deliver `event` to every subscriber with room for it. Returns the
    /// number of subscribers that received it.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let event = Arc::new(event);
        let mut inner = self.inner.lock();
        let mut delivered = 0;
        inner.senders.retain(|id, tx| match tx.try_send(Arc::clone(&event)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    session_id = event.session_id(),
                    subscriber = id,
                    "subscriber lagging, event dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Drop every sender so subscribers drain what is buffered and then see
    /// end of stream. Later subscriptions are closed immediately.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.senders.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().senders.len()
    }
}
