//! # ManagedPeer: re-armable state machine over a transport peer.
//!
//! ## State machine
//! ```text
//!              reconfigure(Some(opts))          transport Open{id}
//!   inactive ─────────────────────────► active ───────────────────► ready
//!      ▲                                  │                           │
//!      │        reconfigure / close       │     transport Close       ▼
//!      └──────────────────────────────────┴──────────────────── closed / errored
//!               (Deactivate: resets ready, closed, id, error)
//! ```
//!
//! ## Rules
//! - Reconfiguring always tears the current transport peer down first (idempotent).
//! - Events of a torn-down transport peer are ignored.
//! - Incoming data connections and calls are checked against the *current* [`PeerConfig`];
//!   rejected ones are closed immediately and never published.
//! - `connect()` waits for readiness; it fails on error or deactivation, whichever comes first.
//! - Config changes republish the state after the config bus finished delivering,
//!   so a state subscriber may change the config from any thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::bus::{EventBus, StickyBus, StickySubscribable, Subscribable};
use crate::conn::ManagedDataConnection;
use crate::error::PeerError;
use crate::peer::config::{PeerConfig, PeerOptions};
use crate::peer::state::{PeerEvent, PeerState};
use crate::transport::{ListenerId, PeerHandle, PeerHandleEvent, Transport};

/// Transport peer currently owned by a [`ManagedPeer`].
struct ActivePeer {
    handle: Arc<dyn PeerHandle>,
    listener: Option<ListenerId>,
}

/// Supervised wrapper around transport peers.
///
/// Starts inactive; [`reconfigure`](Self::reconfigure) creates the transport peer.
pub struct ManagedPeer {
    transport: Arc<dyn Transport>,
    events: EventBus<PeerEvent>,
    config: StickyBus<PeerConfig>,
    state: StickyBus<PeerState>,
    active: Mutex<Option<ActivePeer>>,
    /// Bumped on every teardown; listeners of older transport peers compare against it.
    generation: AtomicU64,
    me: Weak<ManagedPeer>,
}

impl ManagedPeer {
    /// Creates an inactive peer that will use `transport` once configured.
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            transport,
            events: EventBus::new(),
            config: StickyBus::new(PeerConfig::default()),
            state: StickyBus::new(PeerState::default()),
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
            me: me.clone(),
        })
    }

    /// Discrete events.
    pub fn event_bus(&self) -> Subscribable<PeerEvent> {
        self.events.subscribable()
    }

    /// Latest [`PeerState`], replayed to new subscribers.
    pub fn state_bus(&self) -> StickySubscribable<PeerState> {
        self.state.subscribable()
    }

    /// Shorthand for `state_bus().last()`.
    pub fn state(&self) -> PeerState {
        self.state.last()
    }

    /// Current acceptance policy.
    pub fn config(&self) -> PeerConfig {
        self.config.last()
    }

    /// Replaces the acceptance policy. Affects only future incoming connections.
    pub fn set_config(&self, config: PeerConfig) {
        self.config.emit(config);
        self.sync_config();
    }

    /// Derives the next acceptance policy from the current one.
    pub fn update_config(&self, f: impl FnOnce(&PeerConfig) -> PeerConfig) {
        self.config.update(f);
        self.sync_config();
    }

    /// Copies the latest config into the state. Runs outside the config bus
    /// delivery, so the two buses are never locked together in config-then-state order.
    fn sync_config(&self) {
        self.state.update_if(|s| {
            let cfg = self.config.last();
            (s.config != cfg).then(|| PeerState {
                config: cfg,
                ..s.clone()
            })
        });
    }

    /// Replaces the transport peer.
    ///
    /// Tears the current transport peer down (if any). With `Some(options)` a new
    /// transport peer is created under `id`, or a fresh UUID when `id` is `None`.
    ///
    /// ### Errors
    /// [`PeerError::Transport`] if the transport cannot create the peer; the
    /// managed peer is then left inactive.
    pub fn reconfigure(
        self: &Arc<Self>,
        options: Option<PeerOptions>,
        id: Option<String>,
    ) -> Result<(), PeerError> {
        self.tear_down();

        let Some(options) = options else {
            return Ok(());
        };
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let handle = self
            .transport
            .create_peer(&id, &options)
            .map_err(PeerError::Transport)?;
        let generation = self.generation.load(Ordering::SeqCst);

        *self.active.lock() = Some(ActivePeer {
            handle: Arc::clone(&handle),
            listener: None,
        });
        tracing::debug!(%id, generation, "Transport peer created");
        self.handle_event(PeerEvent::Activate);

        let weak = Arc::downgrade(self);
        let listener = handle.listen(Box::new(move |ev| {
            if let Some(peer) = weak.upgrade() {
                peer.on_transport_event(generation, ev);
            }
        }));

        let stale = {
            let mut active = self.active.lock();
            match active.as_mut() {
                Some(a) if self.generation.load(Ordering::SeqCst) == generation => {
                    a.listener = Some(listener);
                    false
                }
                _ => true,
            }
        };
        if stale {
            handle.unlisten(listener);
        }
        Ok(())
    }

    /// Releases the transport peer. Same as `reconfigure(None, None)`.
    pub fn close(self: &Arc<Self>) {
        self.tear_down();
    }

    /// Opens a data connection to `remote_id`, waiting for readiness first.
    ///
    /// ### Errors
    /// - the peer's recorded error, if it errored (before or while waiting)
    /// - [`PeerError::NotActive`] if inactive (before or while waiting)
    /// - [`PeerError::Transport`] if the transport refuses to connect
    pub async fn connect(&self, remote_id: &str) -> Result<Arc<ManagedDataConnection>, PeerError> {
        let mut states = self.state.subscribe();
        loop {
            let Some(state) = states.recv().await else {
                return Err(PeerError::NotActive);
            };
            if let Some(err) = state.error {
                return Err(err);
            }
            if !state.is_active {
                return Err(PeerError::NotActive);
            }
            if state.is_ready {
                break;
            }
        }
        drop(states);

        self.try_connect(remote_id)
    }

    /// Opens a data connection to `remote_id` without waiting.
    ///
    /// ### Errors
    /// As [`connect`](Self::connect), plus [`PeerError::NotReady`] if the peer
    /// is active but has no id yet.
    pub fn try_connect(&self, remote_id: &str) -> Result<Arc<ManagedDataConnection>, PeerError> {
        let state = self.state.last();
        if let Some(err) = state.error {
            return Err(err);
        }
        if !state.is_active {
            return Err(PeerError::NotActive);
        }
        if !state.is_ready {
            return Err(PeerError::NotReady);
        }

        let handle = self
            .active
            .lock()
            .as_ref()
            .map(|a| Arc::clone(&a.handle))
            .ok_or(PeerError::NotActive)?;
        let channel = handle.connect(remote_id).map_err(PeerError::Transport)?;
        tracing::debug!(remote = %remote_id, "Outbound data connection requested");
        Ok(ManagedDataConnection::owned_by(channel, self.me.clone()))
    }

    fn tear_down(&self) {
        let Some(prev) = self.active.lock().take() else {
            return;
        };

        prev.handle.destroy();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.handle_event(PeerEvent::Deactivate);
        if let Some(listener) = prev.listener {
            prev.handle.unlisten(listener);
        }
        tracing::debug!("Transport peer torn down");
    }

    fn on_transport_event(&self, generation: u64, ev: PeerHandleEvent) {
        if generation != self.generation.load(Ordering::SeqCst) {
            return;
        }

        let config = self.config.last();
        match ev {
            PeerHandleEvent::Open { id } => self.handle_event(PeerEvent::Open { id }),
            PeerHandleEvent::Close => self.handle_event(PeerEvent::Close),
            PeerHandleEvent::Disconnected { current_id } => {
                self.handle_event(PeerEvent::Disconnected { current_id })
            }
            PeerHandleEvent::Error(e) => self.handle_event(PeerEvent::Error(PeerError::Transport(e))),
            PeerHandleEvent::Connection(channel) => {
                if config.accept_data_connections {
                    let conn = ManagedDataConnection::owned_by(channel, self.me.clone());
                    self.handle_event(PeerEvent::DataConnection(conn));
                } else {
                    tracing::debug!(remote = %channel.peer(), "Rejecting incoming data connection");
                    if let Err(e) = channel.close() {
                        tracing::warn!(remote = %channel.peer(), error = %e, "Failed to close rejected data connection");
                    }
                }
            }
            PeerHandleEvent::Call(call) => {
                if config.accept_media_connections {
                    self.handle_event(PeerEvent::MediaConnection(call));
                } else {
                    tracing::debug!(remote = %call.peer(), "Rejecting incoming call");
                    if let Err(e) = call.close() {
                        tracing::warn!(remote = %call.peer(), error = %e, "Failed to close rejected call");
                    }
                }
            }
        }
    }

    /// Applies the state transition of `event`, then publishes it.
    fn handle_event(&self, event: PeerEvent) {
        match &event {
            PeerEvent::Activate => self.state.update(|s| PeerState {
                is_active: true,
                ..s.clone()
            }),
            PeerEvent::Deactivate => self.state.update(|s| PeerState {
                is_active: false,
                is_ready: false,
                is_closed: false,
                id: None,
                error: None,
                ..s.clone()
            }),
            PeerEvent::Open { id } => self.state.update(|s| PeerState {
                is_active: true,
                is_ready: true,
                id: Some(id.clone()),
                ..s.clone()
            }),
            PeerEvent::Close => self.state.update(|s| PeerState {
                is_ready: false,
                is_closed: true,
                ..s.clone()
            }),
            PeerEvent::Error(err) => self.state.update(|s| PeerState {
                error: Some(err.clone()),
                is_ready: false,
                ..s.clone()
            }),
            PeerEvent::DataConnection(_)
            | PeerEvent::MediaConnection(_)
            | PeerEvent::Disconnected { .. } => {}
        }

        tracing::debug!(event = event.as_label(), state = %self.state.last(), "Peer event");
        self.events.emit(event);
    }
}

impl Drop for ManagedPeer {
    fn drop(&mut self) {
        if let Some(prev) = self.active.get_mut().take() {
            if let Some(listener) = prev.listener {
                prev.handle.unlisten(listener);
            }
            prev.handle.destroy();
        }
    }
}
