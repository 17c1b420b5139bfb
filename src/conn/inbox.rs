use bytes::Bytes;

use crate::conn::managed::ManagedDataConnection;
use crate::error::ConnError;

/// Receiving side of a [`ManagedDataConnection`].
///
/// Messages that arrived but were unread when the connection closed stay
/// readable (in order) until exhausted; only then do reads fail.
pub struct MessageQueue<'a> {
    conn: &'a ManagedDataConnection,
}

impl<'a> MessageQueue<'a> {
    pub(super) fn new(conn: &'a ManagedDataConnection) -> Self {
        Self { conn }
    }

    /// Number of messages readable without waiting.
    pub fn len(&self) -> usize {
        let io = self.conn.io.lock();
        if !io.after_close.is_empty() {
            return io.after_close.len();
        }
        if io.inbox_closed {
            return 0;
        }
        self.conn.inbox.result_queue_len()
    }

    /// Returns true if nothing is readable without waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the oldest unread message, or `None` without waiting.
    pub fn pop(&self) -> Option<Bytes> {
        let mut io = self.conn.io.lock();
        if let Some(msg) = io.after_close.pop_front() {
            return Some(msg);
        }
        if io.inbox_closed {
            return None;
        }
        self.conn.inbox.pop()
    }

    /// Waits for the next message.
    ///
    /// ### Errors
    /// - [`ConnError::Closed`] if the connection closed and nothing unread is left.
    /// - The connection's failure if it errors while this call is waiting.
    pub async fn receive(&self) -> Result<Bytes, ConnError> {
        {
            let mut io = self.conn.io.lock();
            if let Some(msg) = io.after_close.pop_front() {
                return Ok(msg);
            }
            if io.inbox_closed {
                return Err(ConnError::closed("receive after close"));
            }
        }

        match self.conn.inbox.pop_async().await {
            Ok(msg) => Ok(msg),
            Err(err) => match self.conn.io.lock().after_close.pop_front() {
                Some(msg) => Ok(msg),
                None => Err(err),
            },
        }
    }
}
