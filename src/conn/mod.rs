//! # Managed data connections.
//!
//! This module turns one transport [`DataChannel`](crate::transport::DataChannel)
//! into a deterministic state machine:
//! - [`ManagedDataConnection`] owns the channel, its pre-send queue and inbox
//! - [`ConnectionState`], [`ConnectionEvent`] state snapshot and discrete events
//! - [`MessageQueue`] receiving side (`pop`, `receive`)
//!
//! ```text
//! DataChannel ──listen──► ManagedDataConnection ──► event bus  (Open/Close/Data/Error)
//!                               │                ├─► state bus  (sticky ConnectionState)
//!                               │                └─► inbox ──► MessageQueue::{pop, receive}
//!                               └─ send() ──► pre-send queue ──(on Open)──► DataChannel::send
//! ```

mod inbox;
mod managed;
mod state;

pub use inbox::MessageQueue;
pub use managed::ManagedDataConnection;
pub use state::{ConnectionEvent, ConnectionState};
