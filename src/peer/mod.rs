//! # Managed peers.
//!
//! - [`ManagedPeer`] owns the transport peer, its acceptance policy and state
//! - [`PeerState`], [`PeerEvent`] state snapshot and discrete events
//! - [`PeerConfig`], [`PeerOptions`] acceptance policy and transport options
//!
//! ```text
//! Transport ──create_peer──► PeerHandle ──listen──► ManagedPeer ──► event bus (PeerEvent)
//!                                                      │         └─► state bus (sticky PeerState)
//!                      incoming Connection ──policy──► ManagedDataConnection ──► PeerEvent::DataConnection
//!                      incoming Call       ──policy──► PeerEvent::MediaConnection
//! ```

mod config;
mod managed;
mod state;

pub use config::{PeerConfig, PeerOptions};
pub use managed::ManagedPeer;
pub use state::{PeerEvent, PeerState};
