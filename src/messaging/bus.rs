/// Playback event bus
///
/// Fan-out of `Event`s to any number of listeners over unbounded crossbeam
/// channels, so publishing from the serialized audio context never blocks.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use super::events::Event;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(usize);

#[derive(Default)]
struct BusInner {
    listeners: Mutex<BTreeMap<SubscriberId, Sender<Event>>>,
    next_id: AtomicUsize,
}

/// Cloneable handle to one shared set of listeners
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Events published from now on are delivered to
    /// the returned receiver in publish order.
    pub fn subscribe(&self) -> (Receiver<Event>, SubscriberId) {
        let (tx, rx) = unbounded();
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().insert(id, tx);
        tracing::debug!("Event listener {:?} subscribed", id);
        (rx, id)
    }

    /// Drop a listener; its receiver disconnects once drained
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.inner.listeners.lock().remove(&id).is_some() {
            tracing::debug!("Event listener {:?} unsubscribed", id);
        }
    }

    /// Deliver `event` to every listener, pruning those whose receiver
    /// was dropped
    pub fn publish(&self, event: Event) {
        tracing::trace!("Publishing event: {}", event.description());

        self.inner.listeners.lock().retain(|id, tx| {
            match tx.try_send(event.clone()) {
                Err(TrySendError::Disconnected(_)) => {
                    tracing::debug!("Event listener {:?} went away", id);
                    false
                }
                _ => true,
            }
        });
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}
