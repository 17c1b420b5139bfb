use std::fmt;
use std::sync::Arc;

use crate::conn::ManagedDataConnection;
use crate::error::PeerError;
use crate::peer::config::PeerConfig;
use crate::transport::MediaCall;

/// Snapshot of a managed peer.
///
/// Unlike a data connection this state is re-armable: deactivation resets
/// `is_ready`, `is_closed`, `id` and `error`.
#[derive(Debug, Clone, Default)]
pub struct PeerState {
    /// The peer has an id and may open or accept connections.
    pub is_ready: bool,
    /// A transport peer exists.
    pub is_active: bool,
    /// The transport peer was destroyed (possibly externally). Implies `!is_ready`.
    pub is_closed: bool,
    /// Failure reported by the current transport peer.
    pub error: Option<PeerError>,
    /// Id of the current transport peer, once ready.
    pub id: Option<String>,
    /// Current acceptance policy.
    pub config: PeerConfig,
}

impl PeerState {
    /// Short label of the current phase, for logs.
    pub fn as_label(&self) -> &'static str {
        if self.error.is_some() {
            "errored"
        } else if !self.is_active {
            "inactive"
        } else if self.is_closed {
            "closed"
        } else if self.is_ready {
            "ready"
        } else {
            "active"
        }
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Discrete event of a managed peer.
#[derive(Clone)]
pub enum PeerEvent {
    /// The transport peer failed.
    Error(PeerError),
    /// An incoming data connection was accepted.
    DataConnection(Arc<ManagedDataConnection>),
    /// An incoming call was accepted. Forwarded as the transport's own object.
    MediaConnection(Arc<dyn MediaCall>),
    /// The transport peer lost its broker; no state change.
    Disconnected {
        /// Id the peer had.
        current_id: String,
    },
    /// The transport peer was destroyed.
    Close,
    /// The transport peer obtained `id` and is ready.
    Open {
        /// Assigned id.
        id: String,
    },
    /// A transport peer was created.
    Activate,
    /// The transport peer was torn down.
    Deactivate,
}

impl PeerEvent {
    /// Short stable label, for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PeerEvent::Error(_) => "peer_error",
            PeerEvent::DataConnection(_) => "peer_data_connection",
            PeerEvent::MediaConnection(_) => "peer_media_connection",
            PeerEvent::Disconnected { .. } => "peer_disconnected",
            PeerEvent::Close => "peer_close",
            PeerEvent::Open { .. } => "peer_open",
            PeerEvent::Activate => "peer_activate",
            PeerEvent::Deactivate => "peer_deactivate",
        }
    }
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEvent::Error(e) => f.debug_tuple("Error").field(e).finish(),
            PeerEvent::DataConnection(c) => f.debug_tuple("DataConnection").field(c).finish(),
            PeerEvent::MediaConnection(c) => {
                f.debug_tuple("MediaConnection").field(&c.peer()).finish()
            }
            PeerEvent::Disconnected { current_id } => f
                .debug_struct("Disconnected")
                .field("current_id", current_id)
                .finish(),
            PeerEvent::Close => f.write_str("Close"),
            PeerEvent::Open { id } => f.debug_struct("Open").field("id", id).finish(),
            PeerEvent::Activate => f.write_str("Activate"),
            PeerEvent::Deactivate => f.write_str("Deactivate"),
        }
    }
}
