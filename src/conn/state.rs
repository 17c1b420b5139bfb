use std::fmt;

use bytes::Bytes;

use crate::error::ConnError;

/// Snapshot of a managed data connection.
///
/// ### Invariants
/// - `error.is_some()` implies `is_closed`.
/// - `is_closed` is terminal: no later snapshot differs from the first closed one.
/// - `is_open` turns true at most once.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    /// The transport opened the channel and every pre-open message was transmitted.
    pub is_open: bool,
    /// The connection reached its terminal state.
    pub is_closed: bool,
    /// Failure that closed the connection, if any.
    pub error: Option<ConnError>,
}

impl ConnectionState {
    /// Short label of the current phase, for logs.
    pub fn as_label(&self) -> &'static str {
        match (self.is_open, self.is_closed, self.error.is_some()) {
            (_, true, true) => "errored",
            (_, true, false) => "closed",
            (true, false, _) => "open",
            (false, false, _) => "pending",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Discrete event of a managed data connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The transport opened the channel.
    Open,
    /// The transport closed the channel.
    Close,
    /// A message arrived. It is also queued in the inbox unless the inbox was closed.
    Data(Bytes),
    /// The transport reported a failure.
    Error(ConnError),
}

impl ConnectionEvent {
    /// Short stable label, for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionEvent::Open => "conn_open",
            ConnectionEvent::Close => "conn_close",
            ConnectionEvent::Data(_) => "conn_data",
            ConnectionEvent::Error(_) => "conn_error",
        }
    }
}
