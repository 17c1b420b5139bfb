//! # peervisor
//!
//! **Peervisor** supervises peer-to-peer data connections on top of a pluggable
//! transport. It turns raw transport callbacks into deterministic state machines
//! with observable event and state buses, and runs one isolated handler per
//! registered connection.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌──────────────────────────────────────────────────────────────────┐
//!  │  Transport (trait objects: Transport, PeerHandle, DataChannel)   │
//!  └──────┬─────────────────────────────────────────────┬─────────────┘
//!         │ PeerHandleEvent                             │ ChannelEvent
//!         ▼                                             ▼
//!  ┌──────────────────────────┐  accepted /   ┌──────────────────────────────┐
//!  │  ManagedPeer             │  connect()    │  ManagedDataConnection       │
//!  │  - event bus (PeerEvent) │ ────────────► │  - event bus (ConnectionEvent)│
//!  │  - sticky PeerState      │               │  - sticky ConnectionState    │
//!  │  - sticky PeerConfig     │               │  - pre-send queue, inbox     │
//!  └──────────────────────────┘               └──────────────┬───────────────┘
//!                                                            │ typically the `Conn`
//!                                                            ▼
//!  ┌──────────────────────────────────────────────────────────────────┐
//!  │  ConnRegistry<A: Adapter>                                        │
//!  │  - per entry: config bus ─► handler task ─► state bus            │
//!  │  - sticky aggregate { id → state, is_closed, error, done }       │
//!  └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Data connection lifecycle
//! ```text
//! not-open ──Open──► open ──Close──► closed
//!    │                 │
//!    └──────Error──────┴──────────► errored (closed, error recorded)
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Connections**   | Ordered pre-open sends, inbox surviving close.            | [`ManagedDataConnection`], [`MessageQueue`] |
//! | **Peers**         | Re-armable peer, acceptance policy, waiting `connect`.    | [`ManagedPeer`], [`PeerConfig`]             |
//! | **Registry**      | Isolated handler per entry, aggregate snapshot bus.       | [`ConnRegistry`], [`Adapter`]               |
//! | **Buses**         | Synchronous broadcast, sticky replay, async receivers.    | [`EventBus`], [`StickyBus`]                 |
//! | **Transport**     | Seam for the underlying peer-to-peer library.             | [`Transport`], [`DataChannel`]              |
//! | **Errors**        | Typed errors per layer.                                   | [`ConnError`], [`PeerError`], [`HandlerError`] |
//!
//! ## Optional features
//! - `logging`: exports a simple [`LogWriter`] that reports bus events through `tracing`.
//!
//! ## Example
//! ```rust,ignore
//! use peervisor::{ManagedPeer, PeerConfig, PeerOptions};
//!
//! let peer = ManagedPeer::new(transport);
//! peer.set_config(PeerConfig::accept_all());
//! peer.reconfigure(Some(PeerOptions::default()), Some("alice".into()))?;
//!
//! let conn = peer.connect("bob").await?;
//! conn.send("hello")?;
//! let reply = conn.message_queue().receive().await?;
//! ```

mod bus;
mod conn;
mod error;
mod peer;
mod queue;
mod registry;
pub mod transport;

// ---- Public re-exports ----

pub use bus::{BusReceiver, EventBus, StickyBus, StickySubscribable, Subscribable, Subscription};
pub use conn::{ConnectionEvent, ConnectionState, ManagedDataConnection, MessageQueue};
pub use error::{BoxError, ConnError, HandlerError, PeerError, RegistryError, TransportError};
pub use peer::{ManagedPeer, PeerConfig, PeerEvent, PeerOptions, PeerState};
pub use queue::AsyncQueue;
pub use registry::{
    Adapter, AdapterHandle, Completion, ConnRegistry, EntryId, EntryOutcome, EntrySnapshot,
    RegistrySnapshot,
};
pub use transport::{DataChannel, MediaCall, PeerHandle, Transport};

// Optional: expose a simple built-in logger (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
mod log;
#[cfg(feature = "logging")]
pub use log::LogWriter;
