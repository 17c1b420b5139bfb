//! # ManagedDataConnection: state machine over one transport data channel.
//!
//! ## State machine
//! ```text
//!             transport Open (pre-send queue flushed)
//!   pending ──────────────────────────────────────────► open
//!      │                                                  │
//!      │ transport Close / Error                          │ transport Close / Error
//!      ▼                                                  ▼
//!   closed (error = None | Some(e))  ◄────────────────────┘   (terminal)
//! ```
//!
//! ## Rules
//! - `send()` before open queues (FIFO); the queue is transmitted on Open, before `is_open` is published.
//! - A transport failure while flushing closes the connection with that failure; the rest of the queue is dropped.
//! - Cleanup runs once: unread messages move to the post-close inbox, the pre-send queue is cleared,
//!   the live inbox is closed and the channel is asked to close (failures ignored).
//! - Every transport Data event is published on the event bus, even after the inbox closed.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::bus::{EventBus, StickyBus, StickySubscribable, Subscribable};
use crate::conn::inbox::MessageQueue;
use crate::conn::state::{ConnectionEvent, ConnectionState};
use crate::error::ConnError;
use crate::peer::ManagedPeer;
use crate::queue::AsyncQueue;
use crate::transport::{ChannelEvent, DataChannel, ListenerId};

/// Mutable bookkeeping, guarded by one lock.
#[derive(Default)]
pub(super) struct Io {
    /// Transport reported Open and the pre-send queue is being transmitted.
    flushing: bool,
    /// Pre-send queue fully transmitted; `send` goes straight to the channel.
    open: bool,
    /// Terminal transition happened.
    closed: bool,
    pre_send: VecDeque<Bytes>,
    pub(super) after_close: VecDeque<Bytes>,
    pub(super) inbox_closed: bool,
}

/// Supervised wrapper around a transport [`DataChannel`].
///
/// Created by [`ManagedPeer`](crate::ManagedPeer) for outbound and accepted
/// inbound channels, or directly with [`ManagedDataConnection::new`].
pub struct ManagedDataConnection {
    channel: Arc<dyn DataChannel>,
    events: EventBus<ConnectionEvent>,
    state: StickyBus<ConnectionState>,
    pub(super) inbox: AsyncQueue<Bytes, ConnError>,
    pub(super) io: Mutex<Io>,
    listener: Mutex<Option<ListenerId>>,
    owner: Weak<ManagedPeer>,
}

impl ManagedDataConnection {
    /// Wraps `channel` and starts listening to its events.
    pub fn new(channel: Arc<dyn DataChannel>) -> Arc<Self> {
        Self::owned_by(channel, Weak::new())
    }

    /// Like [`new`](Self::new), remembering the peer that opened or accepted the channel.
    pub(crate) fn owned_by(channel: Arc<dyn DataChannel>, owner: Weak<ManagedPeer>) -> Arc<Self> {
        let conn = Arc::new(Self {
            channel,
            events: EventBus::new(),
            state: StickyBus::new(ConnectionState::default()),
            inbox: AsyncQueue::new(),
            io: Mutex::new(Io::default()),
            listener: Mutex::new(None),
            owner,
        });

        let weak = Arc::downgrade(&conn);
        let id = conn.channel.listen(Box::new(move |ev| {
            if let Some(conn) = weak.upgrade() {
                conn.on_channel_event(ev);
            }
        }));
        *conn.listener.lock() = Some(id);
        conn
    }

    /// Id of the remote peer.
    pub fn peer_id(&self) -> &str {
        self.channel.peer()
    }

    /// Peer this connection belongs to.
    ///
    /// `None` for connections built with [`new`](Self::new) and once the peer was dropped.
    /// Events carry no source; observers sharing one subscriber across connections
    /// capture the connection (or this peer) in the closure instead.
    pub fn managed_peer(&self) -> Option<Arc<ManagedPeer>> {
        self.owner.upgrade()
    }

    /// Label the channel was created with.
    pub fn label(&self) -> &str {
        self.channel.label()
    }

    /// Discrete events (Open, Close, Data, Error).
    pub fn event_bus(&self) -> Subscribable<ConnectionEvent> {
        self.events.subscribable()
    }

    /// Latest [`ConnectionState`], replayed to new subscribers.
    pub fn state_bus(&self) -> StickySubscribable<ConnectionState> {
        self.state.subscribable()
    }

    /// Shorthand for `state_bus().last()`.
    pub fn state(&self) -> ConnectionState {
        self.state.last()
    }

    /// Received messages.
    pub fn message_queue(&self) -> MessageQueue<'_> {
        MessageQueue::new(self)
    }

    /// Sends `data`, or queues it until the channel opens.
    ///
    /// ### Errors
    /// - [`ConnError::Closed`] if the connection already closed; nothing is queued or sent.
    /// - [`ConnError::Transport`] if the channel is open and the transport rejects the
    ///   message. The connection state is left untouched so the caller can react.
    pub fn send(&self, data: impl Into<Bytes>) -> Result<(), ConnError> {
        let data = data.into();
        {
            let mut io = self.io.lock();
            if io.closed {
                return Err(ConnError::closed("send after close"));
            }
            if !io.open {
                io.pre_send.push_back(data);
                return Ok(());
            }
        }
        self.channel
            .send(data)
            .map_err(|e| ConnError::transport("send", e))
    }

    /// Asks the transport to close the channel.
    ///
    /// The connection becomes closed once the transport confirms with its Close
    /// event. No-op on a closed connection.
    ///
    /// ### Errors
    /// [`ConnError::Transport`] if the transport refuses; the state is left untouched.
    pub fn close(&self) -> Result<(), ConnError> {
        if self.io.lock().closed {
            return Ok(());
        }
        self.channel.close().map_err(|e| {
            tracing::warn!(peer = %self.peer_id(), error = %e, "Transport refused to close data channel");
            ConnError::transport("close", e)
        })
    }

    fn on_channel_event(&self, ev: ChannelEvent) {
        match ev {
            ChannelEvent::Open => {
                self.open();
                self.events.emit(ConnectionEvent::Open);
            }
            ChannelEvent::Close => {
                let first = {
                    let mut io = self.io.lock();
                    !std::mem::replace(&mut io.closed, true)
                };
                if first {
                    self.state.update_if(|s| {
                        (!s.is_closed).then(|| ConnectionState {
                            is_closed: true,
                            ..s.clone()
                        })
                    });
                    tracing::debug!(peer = %self.peer_id(), "Data connection closed");
                }
                self.cleanup(None);
                self.events.emit(ConnectionEvent::Close);
            }
            ChannelEvent::Data(data) => {
                {
                    let io = self.io.lock();
                    if !io.inbox_closed {
                        self.inbox.append(data.clone());
                    }
                }
                self.events.emit(ConnectionEvent::Data(data));
            }
            ChannelEvent::Error(e) => {
                let err = ConnError::transport("transport reported an error", e);
                self.fail(err.clone());
                self.events.emit(ConnectionEvent::Error(err));
            }
        }
    }

    /// Flushes the pre-send queue, then publishes `is_open`.
    fn open(&self) {
        {
            let mut io = self.io.lock();
            if io.closed || io.open || io.flushing {
                return;
            }
            io.flushing = true;
        }

        loop {
            let batch: Vec<Bytes> = {
                let mut io = self.io.lock();
                if io.closed {
                    return;
                }
                if io.pre_send.is_empty() {
                    io.flushing = false;
                    io.open = true;
                    break;
                }
                io.pre_send.drain(..).collect()
            };

            for msg in batch {
                if let Err(e) = self.channel.send(msg) {
                    self.fail(ConnError::transport("flush queued message", e));
                    return;
                }
            }
        }

        if self.state.update_if(|s| {
            (!s.is_closed && !s.is_open).then(|| ConnectionState {
                is_open: true,
                ..s.clone()
            })
        }) {
            tracing::debug!(peer = %self.peer_id(), "Data connection open");
        }
    }

    /// Terminal transition with an error. Only the first failure is recorded.
    fn fail(&self, err: ConnError) {
        let first = {
            let mut io = self.io.lock();
            !std::mem::replace(&mut io.closed, true)
        };
        if !first {
            return;
        }

        self.state.update_if(|s| {
            (s.error.is_none() && !s.is_closed).then(|| ConnectionState {
                error: Some(err.clone()),
                is_closed: true,
                ..s.clone()
            })
        });
        tracing::debug!(peer = %self.peer_id(), error = %err, "Data connection failed");
        self.cleanup(Some(err));
    }

    /// Releases resources once; later calls do nothing.
    fn cleanup(&self, err: Option<ConnError>) {
        {
            let mut io = self.io.lock();
            if io.inbox_closed {
                return;
            }
            io.inbox_closed = true;

            while let Some(msg) = self.inbox.pop() {
                io.after_close.push_back(msg);
            }
            io.pre_send.clear();
            self.inbox
                .close(err.unwrap_or_else(|| ConnError::closed("receive after close")));
        }

        if let Err(e) = self.channel.close() {
            tracing::debug!(peer = %self.peer_id(), error = %e, "Ignoring close failure during cleanup");
        }
    }
}

impl Drop for ManagedDataConnection {
    fn drop(&mut self) {
        if let Some(id) = self.listener.lock().take() {
            self.channel.unlisten(id);
        }
    }
}

impl std::fmt::Debug for ManagedDataConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedDataConnection")
            .field("peer", &self.peer_id())
            .field("label", &self.label())
            .field("state", &self.state.last())
            .finish()
    }
}
