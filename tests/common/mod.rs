//! Scripted in-memory transport used by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use peervisor::transport::{
    ChannelEvent, ChannelListener, DataChannel, ListenerId, MediaCall, PeerHandle,
    PeerHandleEvent, PeerListener, Transport,
};
use peervisor::{PeerOptions, TransportError};

type Listeners<E> = Mutex<Vec<(ListenerId, Arc<dyn Fn(E) + Send + Sync>)>>;

fn fire_all<E: Clone>(listeners: &Listeners<E>, ev: E) {
    let snapshot: Vec<_> = listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
    for l in snapshot {
        l(ev.clone());
    }
}

/// Data channel whose events are fired by the test.
pub struct MockChannel {
    peer: String,
    label: String,
    sent: Mutex<Vec<Bytes>>,
    close_calls: AtomicUsize,
    fail_send: AtomicBool,
    fail_close: AtomicBool,
    next_id: AtomicU64,
    listeners: Listeners<ChannelEvent>,
}

impl MockChannel {
    pub fn new(peer: &str) -> Arc<Self> {
        Self::with_label(peer, "")
    }

    pub fn with_label(peer: &str, label: &str) -> Arc<Self> {
        Arc::new(Self {
            peer: peer.to_string(),
            label: label.to_string(),
            sent: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            fail_send: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn fire(&self, ev: ChannelEvent) {
        fire_all(&self.listeners, ev);
    }

    pub fn fire_data(&self, data: &'static str) {
        self.fire(ChannelEvent::Data(Bytes::from_static(data.as_bytes())));
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn fail_closes(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl DataChannel for MockChannel {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::new("send refused"));
        }
        self.sent.lock().push(data);
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::new("close refused"));
        }
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

/// Incoming call stand-in.
pub struct MockCall {
    peer: String,
    closed: AtomicBool,
}

impl MockCall {
    pub fn new(peer: &str) -> Arc<Self> {
        Arc::new(Self {
            peer: peer.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl MediaCall for MockCall {
    fn peer(&self) -> &str {
        &self.peer
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Transport peer whose events are fired by the test.
pub struct MockPeer {
    pub id: String,
    pub options: PeerOptions,
    destroyed: AtomicBool,
    fail_connect: AtomicBool,
    outbound: Mutex<Vec<Arc<MockChannel>>>,
    next_id: AtomicU64,
    listeners: Listeners<PeerHandleEvent>,
}

impl MockPeer {
    fn new(id: &str, options: &PeerOptions) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            options: options.clone(),
            destroyed: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            outbound: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn fire(&self, ev: PeerHandleEvent) {
        fire_all(&self.listeners, ev);
    }

    /// Reports successful registration under the requested id.
    pub fn fire_open(&self) {
        self.fire(PeerHandleEvent::Open {
            id: self.id.clone(),
        });
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn outbound(&self) -> Vec<Arc<MockChannel>> {
        self.outbound.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl PeerHandle for MockPeer {
    fn connect(&self, remote_id: &str) -> Result<Arc<dyn DataChannel>, TransportError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::new("connect refused"));
        }
        let channel = MockChannel::new(remote_id);
        self.outbound.lock().push(Arc::clone(&channel));
        Ok(channel)
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn listen(&self, listener: PeerListener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::from(listener)));
        id
    }

    fn unlisten(&self, id: ListenerId) {
        self.listeners.lock().retain(|(l, _)| *l != id);
    }
}

/// Transport recording every peer it creates.
#[derive(Default)]
pub struct MockTransport {
    peers: Mutex<Vec<Arc<MockPeer>>>,
    fail_create: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn peers(&self) -> Vec<Arc<MockPeer>> {
        self.peers.lock().clone()
    }

    /// Most recently created peer.
    pub fn last_peer(&self) -> Arc<MockPeer> {
        self.peers
            .lock()
            .last()
            .cloned()
            .expect("no transport peer created")
    }
}

impl Transport for MockTransport {
    fn create_peer(
        &self,
        id: &str,
        options: &PeerOptions,
    ) -> Result<Arc<dyn PeerHandle>, TransportError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::new("broker unreachable"));
        }
        let peer = MockPeer::new(id, options);
        self.peers.lock().push(Arc::clone(&peer));
        Ok(peer)
    }
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
