//! Change notification plumbing.
//!
//! A [`Broadcaster`] is a thread-safe subscriber list. Subscribing returns
//! an RAII [`Subscription`]; dropping it unsubscribes. The broadcaster
//! itself holds subscribers weakly and prunes dead entries lazily while
//! emitting, so an emit never calls a callback whose subscription has been
//! dropped.
//!
//! # Invariants
//!
//! 1. Callbacks run in registration order.
//! 2. Callbacks run outside the internal lock — a callback may subscribe,
//!    emit, or drop subscriptions on the same broadcaster.
//! 3. After a [`Subscription`] is dropped, its callback never fires again.

use core::any::Any;
use core::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::lock;

struct Slot<T> {
    callback: Box<dyn Fn(&T) + Send + Sync>,
}

/// A thread-safe, weakly-subscribed notification source.
pub struct Broadcaster<T> {
    subscribers: Mutex<Vec<Weak<Slot<T>>>>,
}

impl<T: 'static> Broadcaster<T> {
    /// An empty broadcaster.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register `callback` for every subsequent emit.
    ///
    /// The callback stays registered for exactly as long as the returned
    /// [`Subscription`] is alive.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let slot = Arc::new(Slot {
            callback: Box::new(callback),
        });
        lock(&self.subscribers).push(Arc::downgrade(&slot));
        Subscription { _keep: slot }
    }

    /// Notify every live subscriber, pruning dead entries as a side effect.
    pub fn emit(&self, value: &T) {
        let live: Vec<Arc<Slot<T>>> = {
            let mut subscribers = lock(&self.subscribers);
            subscribers.retain(|slot| slot.strong_count() > 0);
            subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for slot in live {
            (slot.callback)(value);
        }
    }

    /// Number of live subscribers, pruning dead entries as a side effect.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|slot| slot.strong_count() > 0);
        subscribers.len()
    }
}

impl<T: 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Broadcaster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &lock(&self.subscribers).len())
            .finish()
    }
}

/// RAII guard for one registration on a [`Broadcaster`].
///
/// Dropping it releases the registration; the callback will not fire for
/// any emit that starts afterwards.
pub struct Subscription {
    _keep: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_reaches_subscriber() {
        let broadcaster = Broadcaster::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let _sub = broadcaster.subscribe(move |v: &usize| {
            s.store(*v, Ordering::SeqCst);
        });
        broadcaster.emit(&42);
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn drop_unsubscribes() {
        let broadcaster = Broadcaster::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = broadcaster.subscribe(move |_: &u8| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        broadcaster.emit(&0);
        drop(sub);
        broadcaster.emit(&0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registration_order_preserved() {
        let broadcaster = Broadcaster::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&order), Arc::clone(&order));
        let _s1 = broadcaster.subscribe(move |_: &u8| a.lock().expect("order").push(1));
        let _s2 = broadcaster.subscribe(move |_: &u8| b.lock().expect("order").push(2));
        broadcaster.emit(&0);
        assert_eq!(*order.lock().expect("order"), vec![1, 2]);
    }

    #[test]
    fn dead_entries_pruned_on_emit() {
        let broadcaster = Broadcaster::new();
        let sub = broadcaster.subscribe(|_: &u8| {});
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(sub);
        broadcaster.emit(&0);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn callback_may_use_the_broadcaster() {
        // Emit holds no lock while calling back.
        let broadcaster = Arc::new(Broadcaster::new());
        let inner = Arc::clone(&broadcaster);
        let _sub = broadcaster.subscribe(move |v: &u8| {
            if *v == 0 {
                inner.emit(&1);
            }
        });
        broadcaster.emit(&0);
    }
}
