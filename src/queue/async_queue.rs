//! # Async FIFO with close-with-error.
//!
//! ```text
//! append(x) ──► waiting pop_async? ──yes──► hand x to the oldest waiter
//!                      │
//!                      no──► items.push_back(x)
//!
//! close(e)  ──► every waiting pop_async resolves Err(e); later ones too once items run out
//! ```
//!
//! ## Rules
//! - Items are handed out in append order; waiters are served in arrival order.
//! - A dropped `pop_async` future gives up its place; the item goes to the next waiter.
//! - Appending to a closed queue is a no-op.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct State<T, E> {
    items: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<Result<T, E>>>,
    closed: Option<E>,
}

/// FIFO queue whose readers can wait for the next item.
pub struct AsyncQueue<T, E> {
    state: Mutex<State<T, E>>,
}

impl<T, E: Clone> Default for AsyncQueue<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E: Clone> AsyncQueue<T, E> {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                waiters: VecDeque::new(),
                closed: None,
            }),
        }
    }

    /// Appends `item`, waking the oldest waiting reader if any.
    ///
    /// Returns false (dropping the item) if the queue is closed.
    pub fn append(&self, item: T) -> bool {
        let mut st = self.state.lock();
        if st.closed.is_some() {
            return false;
        }

        let mut item = item;
        while let Some(waiter) = st.waiters.pop_front() {
            let Err(Ok(returned)) = waiter.send(Ok(item)) else {
                return true;
            };
            item = returned;
        }
        st.items.push_back(item);
        true
    }

    /// Removes and returns the oldest buffered item without waiting.
    pub fn pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Waits for the next item.
    ///
    /// Buffered items are returned even after close; once none remain the
    /// closing error is returned.
    pub async fn pop_async(&self) -> Result<T, E> {
        loop {
            let rx = {
                let mut st = self.state.lock();
                if let Some(item) = st.items.pop_front() {
                    return Ok(item);
                }
                if let Some(err) = &st.closed {
                    return Err(err.clone());
                }
                let (tx, rx) = oneshot::channel();
                st.waiters.push_back(tx);
                rx
            };

            if let Ok(res) = rx.await {
                return res;
            }
        }
    }

    /// Number of items buffered (not handed to a reader yet).
    pub fn result_queue_len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Returns true if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed.is_some()
    }

    /// Closes the queue with `err`, rejecting every waiting reader.
    ///
    /// Only the first call has an effect.
    pub fn close(&self, err: E) {
        let waiters = {
            let mut st = self.state.lock();
            if st.closed.is_some() {
                return;
            }
            st.closed = Some(err.clone());
            std::mem::take(&mut st.waiters)
        };

        for waiter in waiters {
            let _ = waiter.send(Err(err.clone()));
        }
    }
}
