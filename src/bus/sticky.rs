//! # Sticky bus: broadcast plus last-value cache.
//!
//! A [`StickyBus`] always holds a value. Emitting replaces it and broadcasts it;
//! subscribing delivers the current value immediately, then every later one.
//!
//! ## Rules
//! - Replay and emission are serialized, so a new subscriber observes each value exactly once.
//! - The lock is re-entrant: a subscriber may emit or subscribe from inside its callback.

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use super::event_bus::{EventBus, Subscription};
use super::receiver::BusReceiver;

struct StickyInner<T> {
    last: Mutex<T>,
    bus: EventBus<T>,
    order: ReentrantMutex<()>,
}

/// Event bus that retains and replays its most recent value.
pub struct StickyBus<T> {
    inner: Arc<StickyInner<T>>,
}

impl<T> Clone for StickyBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> StickyBus<T> {
    /// Creates a bus holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(StickyInner {
                last: Mutex::new(initial),
                bus: EventBus::new(),
                order: ReentrantMutex::new(()),
            }),
        }
    }

    /// Returns a clone of the current value.
    pub fn last(&self) -> T {
        self.inner.last.lock().clone()
    }

    /// Replaces the current value and delivers it to every subscriber.
    ///
    /// On a closed bus the value is neither stored nor delivered.
    pub fn emit(&self, value: T) {
        let _order = self.inner.order.lock();
        if self.inner.bus.is_closed() {
            return;
        }
        *self.inner.last.lock() = value.clone();
        self.inner.bus.emit(value);
    }

    /// Computes the next value from the current one and emits it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let _order = self.inner.order.lock();
        let next = f(&self.last());
        self.emit(next);
    }

    /// Like [`update`](Self::update), but emits only when `f` returns `Some`.
    ///
    /// Returns whether a value was emitted. The read and the emit are not
    /// interleaved with other emits.
    pub fn update_if(&self, f: impl FnOnce(&T) -> Option<T>) -> bool {
        let _order = self.inner.order.lock();
        match f(&self.last()) {
            Some(next) if !self.inner.bus.is_closed() => {
                self.emit(next);
                true
            }
            _ => false,
        }
    }

    /// Registers `f`, calling it with the current value before returning.
    pub fn add_subscriber<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _order = self.inner.order.lock();
        let f = Arc::new(f);
        if !self.inner.bus.is_closed() {
            f(&self.last());
        }
        let forward = Arc::clone(&f);
        self.inner.bus.add_subscriber(move |v: &T| forward(v))
    }

    /// Async receiver starting with the current value.
    ///
    /// On a closed bus the receiver yields the last value, then `None`.
    pub fn subscribe(&self) -> BusReceiver<T> {
        let _order = self.inner.order.lock();
        self.inner.bus.subscribe_seeded(Some(self.last()))
    }

    /// Closes the bus. The last value stays readable through [`last`](Self::last).
    pub fn close(&self) {
        let _order = self.inner.order.lock();
        self.inner.bus.close();
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.inner.bus.is_closed()
    }

    /// Returns a read-only view for observers.
    pub fn subscribable(&self) -> StickySubscribable<T> {
        StickySubscribable { bus: self.clone() }
    }
}

/// Read-only view of a [`StickyBus`].
pub struct StickySubscribable<T> {
    bus: StickyBus<T>,
}

impl<T> Clone for StickySubscribable<T> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> StickySubscribable<T> {
    /// See [`StickyBus::last`].
    pub fn last(&self) -> T {
        self.bus.last()
    }

    /// See [`StickyBus::add_subscriber`].
    pub fn add_subscriber<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.bus.add_subscriber(f)
    }

    /// See [`StickyBus::subscribe`].
    pub fn subscribe(&self) -> BusReceiver<T> {
        self.bus.subscribe()
    }

    /// See [`StickyBus::is_closed`].
    pub fn is_closed(&self) -> bool {
        self.bus.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_last_value_to_new_subscriber() {
        let bus = StickyBus::new(0u32);
        bus.emit(7);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        bus.add_subscriber(move |v| s.lock().push(*v));
        bus.emit(8);

        assert_eq!(*seen.lock(), vec![7, 8]);
        assert_eq!(bus.last(), 8);
    }

    #[test]
    fn update_derives_from_current() {
        let bus = StickyBus::new(vec![1u32]);
        bus.update(|v| {
            let mut next = v.clone();
            next.push(2);
            next
        });
        assert_eq!(bus.last(), vec![1, 2]);
    }

    #[test]
    fn subscriber_may_emit_reentrantly() {
        let bus = StickyBus::new(0u32);
        let b = bus.clone();
        bus.add_subscriber(move |v| {
            if *v == 1 {
                b.emit(2);
            }
        });

        bus.emit(1);
        assert_eq!(bus.last(), 2);
    }

    #[tokio::test]
    async fn receiver_starts_with_current_value() {
        let bus = StickyBus::new("a".to_string());
        let mut rx = bus.subscribe();
        bus.emit("b".to_string());
        bus.close();

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(bus.last(), "b");
    }
}
