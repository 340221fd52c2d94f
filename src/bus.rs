//! In-process event broadcast
//!
//! Explicit publish/subscribe fan-out for lifecycle events:
//! - Subscribers register through [`EventBus::subscribe`] and get a handle
//!   with no backlog; events published before subscription are never replayed.
//! - Publish is fire-and-forget: delivery goes through unbounded channels, so
//!   a slow or torn-down observer never blocks the publisher.
//! - Publishing under the registry lock keeps the relative order of any two
//!   events identical for every observer subscribed for both.
//!
//! Observers that need initial state synchronize from
//! `UpdateLifecycle::snapshot`, not from replay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{EventRecord, LifecycleEvent};

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<EventRecord>>,
}

/// Broadcast channel delivering lifecycle events to live observers.
///
/// Cheap to clone; clones share the same subscriber registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer. The returned handle starts with no backlog.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut registry = lock_registry(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.insert(id, tx);
            id
        };
        debug!(subscriber = id, "Observer subscribed");
        Subscription {
            id,
            rx,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Deregister an observer by handle id.
    ///
    /// Dropping the [`Subscription`] has the same effect; this exists for
    /// callers that hand the receiver off but keep release responsibility.
    pub fn unsubscribe(&self, id: u64) {
        let removed = lock_registry(&self.registry).subscribers.remove(&id);
        if removed.is_some() {
            debug!(subscriber = id, "Observer unsubscribed");
        }
    }

    /// Stamp an event and deliver it to every currently subscribed observer.
    ///
    /// Closed receivers are pruned; delivery failures are otherwise ignored.
    pub fn publish(&self, event: LifecycleEvent) {
        let record = EventRecord::now(event);
        let mut registry = lock_registry(&self.registry);
        registry
            .subscribers
            .retain(|id, tx| match tx.send(record.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(subscriber = id, "Pruning closed subscriber");
                    false
                }
            });
        debug!(
            subscribers = registry.subscribers.len(),
            event = ?record.event,
            "Event published"
        );
    }

    /// Number of currently registered observers.
    pub fn subscriber_count(&self) -> usize {
        lock_registry(&self.registry).subscribers.len()
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    // Registry mutations cannot panic, so poisoning cannot leave torn state.
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Handle for a registered observer.
///
/// Dropping the handle deregisters it; events already queued are discarded
/// with it.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<EventRecord>,
    registry: Arc<Mutex<Registry>>,
}

impl Subscription {
    /// Handle id, for explicit [`EventBus::unsubscribe`].
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. Returns `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<EventRecord> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<EventRecord> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        lock_registry(&self.registry).subscribers.remove(&self.id);
    }
}
