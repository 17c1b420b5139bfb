//! # Peer configuration.
//!
//! Two kinds of settings drive a [`ManagedPeer`](crate::ManagedPeer):
//! - [`PeerConfig`] - acceptance policy, reactive: changes apply to the next incoming
//!   connection or call without restarting anything.
//! - [`PeerOptions`] - options handed to the transport when a peer is (re)created.
//!   Changing them means [`reconfigure`](crate::ManagedPeer::reconfigure), which restarts the peer.

/// Acceptance policy for incoming connections.
///
/// ## Field semantics
/// - `accept_data_connections`: keep incoming data channels (otherwise closed on arrival)
/// - `accept_media_connections`: keep incoming calls (otherwise hung up on arrival)
///
/// Both default to `false`: a peer refuses everything until told otherwise.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerConfig {
    /// If true, incoming data connections are wrapped and published instead of closed.
    pub accept_data_connections: bool,

    /// If true, incoming media calls are published instead of closed.
    pub accept_media_connections: bool,
}

impl PeerConfig {
    /// Policy accepting both data connections and calls.
    pub fn accept_all() -> Self {
        Self {
            accept_data_connections: true,
            accept_media_connections: true,
        }
    }
}

/// Options passed through to [`Transport::create_peer`](crate::transport::Transport::create_peer).
///
/// `None` fields leave the choice to the transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerOptions {
    /// Broker host.
    pub host: Option<String>,
    /// Broker port.
    pub port: Option<u16>,
    /// Broker path prefix.
    pub path: Option<String>,
    /// Use TLS towards the broker.
    pub secure: Option<bool>,
    /// API key presented to the broker.
    pub key: Option<String>,
    /// ICE server URLs handed to the transport unchanged.
    pub ice_servers: Vec<String>,
}
