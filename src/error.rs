//! Error types used by managed connections, managed peers and the registry.
//!
//! This module defines the error enums of each layer:
//!
//! - [`TransportError`] - opaque failure surfaced by the transport collaborator.
//! - [`ConnError`] - errors raised by a [`ManagedDataConnection`](crate::ManagedDataConnection).
//! - [`PeerError`] - errors raised by a [`ManagedPeer`](crate::ManagedPeer).
//! - [`HandlerError`] - whatever a registry adapter's handler or cleanup fails with.
//! - [`RegistryError`] - caller contract violations on the registry.
//!
//! Errors that end up inside state snapshots are `Clone` (causes are shared via `Arc`).
//! Every enum provides `as_label` for logs.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::registry::EntryId;

/// Shared, type-erased error cause.
pub type BoxError = Arc<dyn StdError + Send + Sync + 'static>;

/// # Opaque failure reported by the transport.
///
/// Keeps a human-readable message and, when the transport provides one,
/// the original error as [`source`](StdError::source).
#[derive(Clone)]
pub struct TransportError {
    message: Arc<str>,
    source: Option<BoxError>,
}

impl TransportError {
    /// Creates a transport error from a message only.
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error wrapping the original failure.
    pub fn with_source(
        message: impl Into<Arc<str>>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Returns the transport-provided message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportError")
            .field("message", &self.message)
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for TransportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|s| s as &(dyn StdError + 'static))
    }
}

/// # Errors produced by a managed data connection.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ConnError {
    /// Operation attempted after the connection reached its terminal state.
    #[error("connection closed: {context}")]
    Closed {
        /// What was attempted.
        context: &'static str,
    },

    /// The transport failed; the original failure is kept as the source.
    #[error("transport failure: {context}")]
    Transport {
        /// Where the failure was observed.
        context: &'static str,
        /// Failure reported by the transport.
        #[source]
        source: TransportError,
    },
}

impl ConnError {
    pub(crate) fn closed(context: &'static str) -> Self {
        ConnError::Closed { context }
    }

    pub(crate) fn transport(context: &'static str, source: TransportError) -> Self {
        ConnError::Transport { context, source }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use peervisor::{ConnError, TransportError};
    ///
    /// let err = ConnError::Transport { context: "send", source: TransportError::new("boom") };
    /// assert_eq!(err.as_label(), "conn_transport");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnError::Closed { .. } => "conn_closed",
            ConnError::Transport { .. } => "conn_transport",
        }
    }

    /// Returns true for [`ConnError::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnError::Closed { .. })
    }
}

/// # Errors produced by a managed peer.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum PeerError {
    /// No transport peer is active (never configured, closed, or reconfigured away).
    #[error("peer is not active")]
    NotActive,

    /// The peer is active but has not obtained an id yet.
    #[error("peer is not ready")]
    NotReady,

    /// The transport failed; the original failure is kept as the source.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),
}

impl PeerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PeerError::NotActive => "peer_not_active",
            PeerError::NotReady => "peer_not_ready",
            PeerError::Transport(_) => "peer_transport",
        }
    }
}

/// # Failure of a registry entry's handler or cleanup.
///
/// The registry never inspects these beyond storing them on the failing entry.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum HandlerError {
    /// The handler (or its cleanup) returned an error.
    #[error("handler failed: {0}")]
    Failed(#[source] BoxError),

    /// The handler (or its cleanup) panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The entry's runner was dropped before completing (runtime shut down).
    #[error("handler aborted")]
    Aborted,
}

impl HandlerError {
    /// Wraps any error as [`HandlerError::Failed`].
    pub fn new(err: impl StdError + Send + Sync + 'static) -> Self {
        HandlerError::Failed(Arc::new(err))
    }

    /// Builds a [`HandlerError::Failed`] from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Failed(Arc::new(Message(message.into())))
    }

    /// Returns true if both values carry the very same underlying error.
    ///
    /// Clones share their cause, so an error recorded by the registry is
    /// `same_as` the one the handler returned.
    pub fn same_as(&self, other: &HandlerError) -> bool {
        match (self, other) {
            (HandlerError::Failed(a), HandlerError::Failed(b)) => Arc::ptr_eq(a, b),
            (HandlerError::Panicked(a), HandlerError::Panicked(b)) => a == b,
            (HandlerError::Aborted, HandlerError::Aborted) => true,
            _ => false,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Failed(_) => "handler_failed",
            HandlerError::Panicked(_) => "handler_panicked",
            HandlerError::Aborted => "handler_aborted",
        }
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// # Errors returned by registry mutators.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The id was never issued by this registry or its entry was already removed.
    #[error("unknown registry entry: {0}")]
    UnknownEntry(EntryId),
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::UnknownEntry(_) => "registry_unknown_entry",
        }
    }
}
