//! # Transport seam.
//!
//! The raw peer-to-peer library is consumed through the traits of this module.
//! Implementations translate the library's callbacks into [`ChannelEvent`]s and
//! [`PeerHandleEvent`]s delivered to registered listeners.
//!
//! ```text
//!   Transport::create_peer(id, opts) ──► PeerHandle ──listen──► PeerHandleEvent
//!                                           │
//!                                           ├─ connect(remote) ──► DataChannel ──listen──► ChannelEvent
//!                                           └─ Connection / Call events (incoming)
//! ```
//!
//! ## Rules
//! - Listeners may be invoked from any thread, one event at a time per handle.
//! - Events arriving after `unlisten` are not delivered to that listener.
//! - `close()` / `destroy()` may synchronously re-enter a listener with a `Close` event.

use std::sync::Arc;

use bytes::Bytes;

use crate::error::TransportError;
use crate::peer::PeerOptions;

/// Identifier of a registered listener, scoped to one handle.
pub type ListenerId = u64;

/// Callback invoked for each data channel event.
pub type ChannelListener = Box<dyn Fn(ChannelEvent) + Send + Sync>;

/// Callback invoked for each peer event.
pub type PeerListener = Box<dyn Fn(PeerHandleEvent) + Send + Sync>;

/// Raw event of a transport data channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The channel is ready to transmit.
    Open,
    /// The channel closed (either side).
    Close,
    /// A message arrived.
    Data(Bytes),
    /// The channel failed.
    Error(TransportError),
}

/// Raw event of a transport peer.
#[derive(Clone)]
pub enum PeerHandleEvent {
    /// The peer registered with its broker and obtained `id`.
    Open {
        /// Id under which the peer is reachable.
        id: String,
    },
    /// The peer was destroyed.
    Close,
    /// The peer lost its broker connection; existing channels may survive.
    Disconnected {
        /// Id the peer had when disconnecting.
        current_id: String,
    },
    /// The peer failed.
    Error(TransportError),
    /// A remote peer opened a data channel to us.
    Connection(Arc<dyn DataChannel>),
    /// A remote peer is calling us.
    Call(Arc<dyn MediaCall>),
}

impl std::fmt::Debug for PeerHandleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerHandleEvent::Open { id } => f.debug_struct("Open").field("id", id).finish(),
            PeerHandleEvent::Close => f.write_str("Close"),
            PeerHandleEvent::Disconnected { current_id } => f
                .debug_struct("Disconnected")
                .field("current_id", current_id)
                .finish(),
            PeerHandleEvent::Error(e) => f.debug_tuple("Error").field(e).finish(),
            PeerHandleEvent::Connection(c) => f.debug_tuple("Connection").field(&c.peer()).finish(),
            PeerHandleEvent::Call(c) => f.debug_tuple("Call").field(&c.peer()).finish(),
        }
    }
}

/// A transport data channel.
pub trait DataChannel: Send + Sync + 'static {
    /// Id of the remote peer.
    fn peer(&self) -> &str;

    /// Channel label assigned at creation.
    fn label(&self) -> &str {
        ""
    }

    /// Transmits one message.
    fn send(&self, data: Bytes) -> Result<(), TransportError>;

    /// Requests the channel to close. Completion is reported with [`ChannelEvent::Close`].
    fn close(&self) -> Result<(), TransportError>;

    /// Registers `listener` for all subsequent events.
    fn listen(&self, listener: ChannelListener) -> ListenerId;

    /// Removes a listener. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId);
}

/// A transport media call. Forwarded untouched; this crate only accepts or rejects it.
pub trait MediaCall: Send + Sync + 'static {
    /// Id of the remote peer.
    fn peer(&self) -> &str;

    /// Hangs up.
    fn close(&self) -> Result<(), TransportError>;
}

/// A transport peer.
pub trait PeerHandle: Send + Sync + 'static {
    /// Opens a data channel to `remote_id`.
    fn connect(&self, remote_id: &str) -> Result<Arc<dyn DataChannel>, TransportError>;

    /// Releases the peer and all its channels.
    fn destroy(&self);

    /// Registers `listener` for all subsequent events.
    fn listen(&self, listener: PeerListener) -> ListenerId;

    /// Removes a listener. Unknown ids are ignored.
    fn unlisten(&self, id: ListenerId);
}

/// Factory of transport peers.
pub trait Transport: Send + Sync + 'static {
    /// Creates a peer that will try to register under `id`.
    fn create_peer(
        &self,
        id: &str,
        options: &PeerOptions,
    ) -> Result<Arc<dyn PeerHandle>, TransportError>;
}
