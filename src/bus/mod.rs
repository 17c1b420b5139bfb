//! Synchronous reactive buses.
//!
//! Every managed object in this crate reports through buses of this module:
//! discrete events go through an [`EventBus`], derived state through a
//! [`StickyBus`] that replays its latest value to each new subscriber.
//!
//! ## Contents
//! - [`EventBus`] multi-subscriber broadcast with synchronous delivery
//! - [`StickyBus`] event bus plus a single-slot cache of the last value
//! - [`Subscribable`], [`StickySubscribable`] read-only views handed to observers
//! - [`Subscription`] canceler returned by `add_subscriber`
//! - [`BusReceiver`] async adapter (FIFO of everything delivered after subscribing)
//!
//! ## Rules
//! - **Synchronous delivery**: `emit()` invokes every current subscriber before returning.
//! - **Snapshot per emit**: subscribers added during a delivery do not see that delivery.
//! - **Single writer**: owners keep the bus, observers only get a read-only view.
//! - **Close is terminal**: a closed bus drops its subscribers and ignores further emits;
//!   pending [`BusReceiver::recv`] calls resolve to `None`.

mod event_bus;
mod receiver;
mod sticky;

pub use event_bus::{EventBus, Subscribable, Subscription};
pub use receiver::BusReceiver;
pub use sticky::{StickyBus, StickySubscribable};
