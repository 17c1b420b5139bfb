//! # Simple logging observer for debugging and demos.
//!
//! [`LogWriter`] attaches to the event buses of connections, peers and registries
//! and reports every event through `tracing` at `info` level.
//!
//! ## Output format
//! ```text
//! [peer_activate]
//! [peer_open] id=alice
//! [peer_data_connection] remote=bob
//! [conn_open] remote=bob label=chat
//! [conn_data] remote=bob label=chat bytes=5
//! [registry] entries=1 closed=0
//! ```
//!
//! ## Example
//! ```rust,ignore
//! let peer = ManagedPeer::new(transport);
//! let _sub = LogWriter::attach_peer(&peer);
//! ```

use std::sync::Arc;

use crate::bus::Subscription;
use crate::conn::{ConnectionEvent, ManagedDataConnection};
use crate::peer::{ManagedPeer, PeerEvent};
use crate::registry::{Adapter, ConnRegistry};

/// Logs bus events through `tracing`.
///
/// Enabled via the `logging` feature. Not intended for production use;
/// subscribe to the buses directly for structured handling.
pub struct LogWriter;

impl LogWriter {
    /// Logs every event of `conn`.
    pub fn attach_connection(conn: &Arc<ManagedDataConnection>) -> Subscription {
        let weak = Arc::downgrade(conn);
        conn.event_bus().add_subscriber(move |ev: &ConnectionEvent| {
            let Some(conn) = weak.upgrade() else {
                return;
            };
            let (remote, label) = (conn.peer_id(), conn.label());
            match ev {
                ConnectionEvent::Data(data) => {
                    tracing::info!("[{}] remote={remote} label={label} bytes={}", ev.as_label(), data.len())
                }
                ConnectionEvent::Error(e) => {
                    tracing::info!("[{}] remote={remote} label={label} err={e}", ev.as_label())
                }
                ConnectionEvent::Open | ConnectionEvent::Close => {
                    tracing::info!("[{}] remote={remote} label={label}", ev.as_label())
                }
            }
        })
    }

    /// Logs every event of `peer`; accepted data connections are attached too.
    pub fn attach_peer(peer: &ManagedPeer) -> Subscription {
        peer.event_bus().add_subscriber(|ev: &PeerEvent| match ev {
            PeerEvent::Open { id } => tracing::info!("[{}] id={id}", ev.as_label()),
            PeerEvent::Disconnected { current_id } => {
                tracing::info!("[{}] id={current_id}", ev.as_label())
            }
            PeerEvent::Error(e) => tracing::info!("[{}] err={e}", ev.as_label()),
            PeerEvent::DataConnection(conn) => {
                tracing::info!("[{}] remote={}", ev.as_label(), conn.peer_id());
                // Stays attached for the connection's lifetime; dropping a Subscription keeps it.
                drop(LogWriter::attach_connection(conn));
            }
            PeerEvent::MediaConnection(call) => {
                tracing::info!("[{}] remote={}", ev.as_label(), call.peer())
            }
            PeerEvent::Close | PeerEvent::Activate | PeerEvent::Deactivate => {
                tracing::info!("[{}]", ev.as_label())
            }
        })
    }

    /// Logs a summary of every aggregate snapshot of `registry`.
    pub fn attach_registry<A: Adapter>(registry: &ConnRegistry<A>) -> Subscription {
        registry.state_bus().add_subscriber(|snapshot| {
            let closed = snapshot.values().filter(|e| e.is_closed).count();
            let failed = snapshot.values().filter(|e| e.error.is_some()).count();
            tracing::info!(
                "[registry] entries={} closed={closed} failed={failed}",
                snapshot.len()
            );
        })
    }
}
