//! Event bus
//!
//! Fans lifecycle events out to any number of subscribers over unbounded
//! channels. Publishing never blocks the control path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;

use super::events::Event;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<Event>,
}

struct Inner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicUsize,
}

/// Cloneable handle to a shared set of subscribers
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    /// Subscribe to events, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<Event>, SubscriberId) {
        let (tx, rx) = unbounded();
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.subscribers.write().push(Subscriber { id, sender: tx });
        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.inner.subscribers.write().retain(|s| s.id != id);
    }

    /// Send `event` to every subscriber, dropping those whose receiver is gone
    pub fn publish(&self, event: Event) {
        tracing::debug!("Event: {}", event.description());

        let mut disconnected = Vec::new();
        for subscriber in self.inner.subscribers.read().iter() {
            if subscriber.sender.send(event.clone()).is_err() {
                disconnected.push(subscriber.id);
            }
        }

        if !disconnected.is_empty() {
            self.inner
                .subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    pub fn clear(&self) {
        self.inner.subscribers.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
