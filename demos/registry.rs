//! Supervises loopback data connections with a registry.
//!
//! Run with: `cargo run --example registry --features logging`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use peervisor::transport::{ChannelEvent, ChannelListener, DataChannel, ListenerId};
use peervisor::{
    Adapter, AdapterHandle, ConnRegistry, EntryId, HandlerError, LogWriter, ManagedDataConnection,
    TransportError,
};
use tracing_subscriber::EnvFilter;

/// Channel that echoes every message back to its listeners.
struct Loopback {
    peer: String,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn Fn(ChannelEvent) + Send + Sync>)>>,
}

impl Loopback {
    fn new(peer: &str) -> Arc<Self> {
        Arc::new(Self {
            peer: peer.to_string(),
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        })
    }

    fn fire(&self, ev: ChannelEvent) {
        let targets: Vec<_> = self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for l in targets {
            l(ev.clone());
        }
    }
}

impl DataChannel for Loopback {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn label(&self) -> &str {
        "echo"
    }

    fn send(&self, data: Bytes) -> Result<(), TransportError> {
        self.fire(ChannelEvent::Data(data));
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn listen(&self, listener: ChannelListener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::from(listener)));
        id
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners.lock().retain(|(l, _)| *l != id);
    }
}

/// Counts received messages until the configured limit is reached.
struct Counter;

#[async_trait]
impl Adapter for Counter {
    type Conn = Arc<ManagedDataConnection>;
    type InitData = ();
    type Config = usize;
    type State = usize;

    fn make_initial_config(&self, _: &Self::Conn, _: &(), _: EntryId) -> usize {
        3
    }

    fn make_initial_state(&self, _: &Self::Conn, _: &usize, _: &(), _: EntryId) -> usize {
        0
    }

    async fn handle(&self, h: &AdapterHandle<Self>) -> Result<(), HandlerError> {
        let _log = LogWriter::attach_connection(h.conn());
        let queue = h.conn().message_queue();
        let mut received = 0;
        loop {
            if received >= h.current_config() {
                return Ok(());
            }
            tokio::select! {
                _ = h.cancelled() => return Ok(()),
                msg = queue.receive() => {
                    msg.map_err(HandlerError::new)?;
                    received += 1;
                    h.set_state(received);
                }
            }
        }
    }

    async fn cleanup(
        &self,
        h: &AdapterHandle<Self>,
        error: Option<HandlerError>,
    ) -> Result<(), HandlerError> {
        if let Some(err) = error {
            return Err(err);
        }
        h.conn().close().map_err(HandlerError::new)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = ConnRegistry::new(Counter);
    let _log = LogWriter::attach_registry(&registry);

    let channel = Loopback::new("bob");
    let conn = ManagedDataConnection::new(channel.clone());
    let id = registry.add_conn(Arc::clone(&conn), ());

    for word in ["one", "two", "three"] {
        conn.send(word)?;
    }
    channel.fire(ChannelEvent::Open);

    let done = registry.snapshot()[&id].done.clone();
    done.await?;
    tracing::info!(state = ?registry.snapshot()[&id].state, "entry finished");

    registry.remove_conn(id);
    Ok(())
}
