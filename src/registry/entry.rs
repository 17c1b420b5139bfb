use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use uuid::Uuid;

use crate::error::HandlerError;

/// Opaque identifier of a registry entry, unique for the registry's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(Uuid);

impl EntryId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Terminal outcome of an entry: `Ok` if handler and cleanup succeeded.
pub type EntryOutcome = Result<(), HandlerError>;

/// Clonable future resolving once to the entry's [`EntryOutcome`].
pub type Completion = Shared<BoxFuture<'static, EntryOutcome>>;

/// Aggregate view of one entry.
#[derive(Clone)]
pub struct EntrySnapshot<S> {
    /// Latest state set by the adapter.
    pub state: S,
    /// The handler and its cleanup have finished.
    pub is_closed: bool,
    /// Recorded failure, set together with `is_closed`.
    pub error: Option<HandlerError>,
    /// Resolves when the entry closes.
    pub done: Completion,
}

impl<S: fmt::Debug> fmt::Debug for EntrySnapshot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySnapshot")
            .field("state", &self.state)
            .field("is_closed", &self.is_closed)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Aggregate view of a registry, keyed and ordered by id.
pub type RegistrySnapshot<S> = Arc<BTreeMap<EntryId, EntrySnapshot<S>>>;
