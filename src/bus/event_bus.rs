//! # Callback event bus.
//!
//! [`EventBus`] delivers each emitted value to all registered callbacks on the
//! caller's thread. Owners emit; observers receive a [`Subscribable`] view.
//!
//! ```text
//! emit(ev) ──► snapshot subscriber list ──► cb1(&ev) ──► cb2(&ev) ──► ... ──► return
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::receiver::BusReceiver;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    list: Vec<(u64, Callback<T>)>,
    closed: bool,
}

/// Multi-subscriber broadcast with synchronous delivery.
///
/// Cheap to clone; clones share the subscriber list.
pub struct EventBus<T> {
    inner: Arc<Mutex<Subscribers<T>>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventBus<T> {
    /// Creates an open bus with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                list: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Registers `f` for every subsequent emit.
    ///
    /// Returns the canceler. On a closed bus the callback is dropped right away
    /// and the returned subscription is inert.
    pub fn add_subscriber<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut subs = self.inner.lock();
            if subs.closed {
                return Subscription::inert();
            }
            let id = subs.next_id;
            subs.next_id += 1;
            subs.list.push((id, Arc::new(f)));
            id
        };

        let weak: Weak<Mutex<Subscribers<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let removed = {
                    let mut subs = inner.lock();
                    subs.list
                        .iter()
                        .position(|(sid, _)| *sid == id)
                        .map(|pos| subs.list.remove(pos))
                };
                drop(removed);
            }
        })
    }

    /// Delivers `event` to every current subscriber, in registration order.
    ///
    /// Does nothing once the bus is closed.
    pub fn emit(&self, event: T) {
        let targets: Vec<Callback<T>> = {
            let subs = self.inner.lock();
            if subs.closed {
                return;
            }
            subs.list.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        for cb in targets {
            cb(&event);
        }
    }

    /// Closes the bus: drops all subscribers and ignores later emits. Idempotent.
    pub fn close(&self) {
        let dropped = {
            let mut subs = self.inner.lock();
            subs.closed = true;
            std::mem::take(&mut subs.list)
        };
        drop(dropped);
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().list.len()
    }

    /// Returns a read-only view for observers.
    pub fn subscribable(&self) -> Subscribable<T> {
        Subscribable { bus: self.clone() }
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates an async receiver of every value emitted from now on.
    pub fn subscribe(&self) -> BusReceiver<T> {
        self.subscribe_seeded(None)
    }

    /// Like [`subscribe`](Self::subscribe), with `seed` queued ahead of live values.
    pub(crate) fn subscribe_seeded(&self, seed: Option<T>) -> BusReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(value) = seed {
            let _ = tx.send(value);
        }
        let subscription = self.add_subscriber(move |ev: &T| {
            let _ = tx.send(ev.clone());
        });
        BusReceiver::new(rx, subscription)
    }
}

/// Read-only view of an [`EventBus`].
pub struct Subscribable<T> {
    bus: EventBus<T>,
}

impl<T> Clone for Subscribable<T> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

impl<T: 'static> Subscribable<T> {
    /// See [`EventBus::add_subscriber`].
    pub fn add_subscriber<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.bus.add_subscriber(f)
    }

    /// See [`EventBus::is_closed`].
    pub fn is_closed(&self) -> bool {
        self.bus.is_closed()
    }
}

impl<T: Clone + Send + 'static> Subscribable<T> {
    /// See [`EventBus::subscribe`].
    pub fn subscribe(&self) -> BusReceiver<T> {
        self.bus.subscribe()
    }
}

/// Canceler for a bus subscription.
///
/// Dropping a `Subscription` does **not** unsubscribe; call [`cancel`](Self::cancel).
pub struct Subscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(f))),
        }
    }

    fn inert() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Removes the subscriber. Idempotent.
    pub fn cancel(&self) {
        let f = self.cancel.lock().take();
        if let Some(f) = f {
            f();
        }
    }

    /// Returns true if the subscription was cancelled (or never registered).
    pub fn is_cancelled(&self) -> bool {
        self.cancel.lock().is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = Arc::clone(&seen);
        bus.add_subscriber(move |v| s1.lock().push(("a", *v)));
        let s2 = Arc::clone(&seen);
        bus.add_subscriber(move |v| s2.lock().push(("b", *v)));

        bus.emit(1);
        bus.emit(2);

        assert_eq!(*seen.lock(), vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]);
    }

    #[test]
    fn cancel_is_idempotent() {
        let bus = EventBus::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let sub = bus.add_subscriber(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(1);
        sub.cancel();
        sub.cancel();
        bus.emit(2);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_subscription_keeps_delivering() {
        let bus = EventBus::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        drop(bus.add_subscriber(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(1);
        bus.emit(2);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn subscriber_added_during_delivery_misses_it() {
        let bus = EventBus::<u32>::new();
        let late_hits = Arc::new(AtomicUsize::new(0));

        let bus2 = bus.clone();
        let late = Arc::clone(&late_hits);
        bus.add_subscriber(move |_| {
            let late = Arc::clone(&late);
            bus2.add_subscriber(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        bus.emit(1);
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);

        bus.emit(2);
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_bus_ignores_emit_and_subscribers() {
        let bus = EventBus::<u32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.add_subscriber(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.close();
        bus.emit(1);
        let sub = bus.add_subscriber(|_| panic!("closed bus must not deliver"));
        bus.emit(2);

        assert!(bus.is_closed());
        assert!(sub.is_cancelled());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn receiver_sees_fifo_and_ends_on_close() {
        let bus = EventBus::<u32>::new();
        let mut rx = bus.subscribe();

        bus.emit(1);
        bus.emit(2);
        bus.close();

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, None);
    }
}
