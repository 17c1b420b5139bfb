use tokio::sync::mpsc;

use super::event_bus::Subscription;

/// Async reader of bus values.
///
/// Buffers (unbounded, FIFO) every value delivered to its subscription.
/// Dropping the receiver cancels the subscription.
pub struct BusReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    subscription: Subscription,
}

impl<T> BusReceiver<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<T>, subscription: Subscription) -> Self {
        Self { rx, subscription }
    }

    /// Waits for the next value.
    ///
    /// Returns `None` once the bus was closed (or the subscription cancelled)
    /// and everything buffered has been read.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns the next buffered value without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Number of values buffered and not yet read.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Stops receiving. Values already buffered stay readable.
    pub fn close(&mut self) {
        self.subscription.cancel();
    }
}

impl<T> Drop for BusReceiver<T> {
    fn drop(&mut self) {
        self.subscription.cancel();
    }
}
