//! Async FIFO queue.
//!
//! [`AsyncQueue`] backs a connection's inbox: producers append synchronously,
//! consumers either poll ([`pop`](AsyncQueue::pop)) or wait
//! ([`pop_async`](AsyncQueue::pop_async)) until an item arrives or the queue is
//! closed with a terminal error.

mod async_queue;

pub use async_queue::AsyncQueue;
