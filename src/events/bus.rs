/*!
 * Event Bus
 *
 * Synchronous, in-order delivery of `KernelEvent`s. `publish` calls every
 * subscriber, in subscription order, before it returns. Handlers may publish
 * further events; those are delivered depth-first inside the outer call.
 *
 * The subscriber list is an RCU snapshot: publishing never holds a lock, so
 * a handler can subscribe, unsubscribe or publish without deadlocking.
 */

use super::types::KernelEvent;
use arc_swap::ArcSwap;
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Event handler callback type
pub type HandlerFn = Arc<dyn Fn(&KernelEvent) + Send + Sync>;

/// Subscription handle
pub type SubscriptionId = u64;

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    name: String,
    handler: HandlerFn,
}

pub struct EventBus {
    subscribers: ArcSwap<Vec<Subscriber>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
        }
    }

    /// Register a handler; it receives every event published afterwards
    pub fn subscribe<F>(&self, name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&KernelEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let subscriber = Subscriber {
            id,
            name: name.into(),
            handler: Arc::new(handler),
        };
        info!("Event subscriber {} registered: {}", id, subscriber.name);

        self.subscribers.rcu(|list| {
            let mut next = Vec::clone(list);
            next.push(subscriber.clone());
            next
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let previous = self.subscribers.rcu(|list| {
            list.iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|s| s.id == id);
        if removed {
            info!("Event subscriber {} removed", id);
        }
        removed
    }

    /// Deliver an event to every subscriber before returning
    pub fn publish(&self, event: KernelEvent) {
        let snapshot = self.subscribers.load_full();
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Publishing {} to {} subscribers",
            event.name(),
            snapshot.len()
        );

        for subscriber in snapshot.iter() {
            (subscriber.handler)(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load().len()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
