//! # Connection registry: one supervised handler per entry.
//!
//! ```text
//! add_conn(conn, init) ──► make_initial_config / make_initial_state
//!        │                        │
//!        │                        ▼
//!        │              Entry { config bus, state bus, token, done }
//!        ▼                        │
//!   tokio::spawn ──► adapter.handle(handle) ──► adapter.cleanup(handle, err)
//!                                                     │
//!                                                     ▼
//!                                  mark closed ──► resolve done ──► publish
//!
//! remove_conn(id) ──► push modify_config_on_remove(last) ──► close config bus
//!                 ──► cancel token ──► drop from map ──► publish
//! ```
//!
//! ## Rules
//! - Handler and cleanup run on their own task; errors and panics are stored on the entry only.
//! - `cleanup` runs exactly once per entry; its error replaces the handler's.
//! - Entries stay in the aggregate after closing until `remove_conn`.
//! - Every mutation (add, state change, close, remove) republishes the aggregate snapshot.
//! - Removal never waits for the handler.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::bus::{StickyBus, StickySubscribable};
use crate::error::{HandlerError, RegistryError};
use crate::registry::adapter::{Adapter, AdapterHandle};
use crate::registry::entry::{
    Completion, EntryId, EntryOutcome, EntrySnapshot, RegistrySnapshot,
};

/// Bookkeeping of one entry.
struct Entry<A: Adapter> {
    config: StickyBus<A::Config>,
    state: StickyBus<A::State>,
    cancel: CancellationToken,
    closed: bool,
    error: Option<HandlerError>,
    done: Completion,
}

/// Registry of independently supervised entries.
///
/// Aggregates every entry into one sticky [`RegistrySnapshot`] bus.
pub struct ConnRegistry<A: Adapter> {
    adapter: Arc<A>,
    entries: Mutex<HashMap<EntryId, Entry<A>>>,
    aggregate: StickyBus<RegistrySnapshot<A::State>>,
}

impl<A: Adapter> ConnRegistry<A> {
    /// Creates an empty registry driven by `adapter`.
    pub fn new(adapter: A) -> Arc<Self> {
        Arc::new(Self {
            adapter: Arc::new(adapter),
            entries: Mutex::new(HashMap::new()),
            aggregate: StickyBus::new(Arc::default()),
        })
    }

    /// Aggregate view, replayed to new subscribers.
    pub fn state_bus(&self) -> StickySubscribable<RegistrySnapshot<A::State>> {
        self.aggregate.subscribable()
    }

    /// Shorthand for `state_bus().last()`.
    pub fn snapshot(&self) -> RegistrySnapshot<A::State> {
        self.aggregate.last()
    }

    /// Number of entries not yet removed.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no entry is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Registers `conn` and starts its handler.
    ///
    /// Returns immediately; the handler runs on a spawned task, so this must be
    /// called from within a Tokio runtime.
    pub fn add_conn(self: &Arc<Self>, conn: A::Conn, init_data: A::InitData) -> EntryId {
        let id = EntryId::new();
        let config = self.adapter.make_initial_config(&conn, &init_data, id);
        let state = self
            .adapter
            .make_initial_state(&conn, &config, &init_data, id);
        let config = StickyBus::new(config);
        let state = StickyBus::new(state);
        let cancel = CancellationToken::new();

        let (tx, rx) = oneshot::channel::<EntryOutcome>();
        let done: Completion = rx
            .map(|res| res.unwrap_or(Err(HandlerError::Aborted)))
            .boxed()
            .shared();

        let weak = Arc::downgrade(self);
        let on_state: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.publish();
            }
        });
        let handle = AdapterHandle::new(
            id,
            conn,
            init_data,
            &config,
            state.clone(),
            on_state,
            cancel.clone(),
        );

        self.entries.lock().insert(
            id,
            Entry {
                config,
                state,
                cancel,
                closed: false,
                error: None,
                done,
            },
        );
        tracing::debug!(%id, "Registry entry added");
        self.publish();

        tokio::spawn(run_entry(
            Arc::clone(&self.adapter),
            handle,
            Arc::downgrade(self),
            tx,
        ));
        id
    }

    /// Pushes `config` to the entry's handler.
    ///
    /// ### Errors
    /// [`RegistryError::UnknownEntry`] if `id` was never issued or was removed.
    pub fn set_config(&self, id: EntryId, config: A::Config) -> Result<(), RegistryError> {
        self.config_bus(id)?.emit(config);
        Ok(())
    }

    /// Pushes a config derived from the entry's current one.
    ///
    /// ### Errors
    /// [`RegistryError::UnknownEntry`] if `id` was never issued or was removed.
    pub fn update_config(
        &self,
        id: EntryId,
        f: impl FnOnce(&A::Config) -> A::Config,
    ) -> Result<(), RegistryError> {
        self.config_bus(id)?.update(f);
        Ok(())
    }

    /// Drops the entry and asks its handler to stop. Does not wait for it.
    ///
    /// Returns false (and does nothing) if `id` is unknown or already removed.
    pub fn remove_conn(&self, id: EntryId) -> bool {
        let removed = self.entries.lock().remove(&id);
        let Some(entry) = removed else {
            tracing::debug!(%id, "Removal of unknown registry entry ignored");
            return false;
        };

        Self::stop(&self.adapter, &entry);
        tracing::debug!(%id, closed = entry.closed, "Registry entry removed");
        self.publish();
        true
    }

    fn stop(adapter: &A, entry: &Entry<A>) {
        entry
            .config
            .update(|config| adapter.modify_config_on_remove(config));
        entry.config.close();
        entry.cancel.cancel();
    }

    fn config_bus(&self, id: EntryId) -> Result<StickyBus<A::Config>, RegistryError> {
        self.entries
            .lock()
            .get(&id)
            .map(|e| e.config.clone())
            .ok_or(RegistryError::UnknownEntry(id))
    }

    /// Records the outcome on the entry, if it is still registered.
    fn finish(&self, id: EntryId, outcome: &EntryOutcome) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.closed = true;
            entry.error = outcome.clone().err();
        }
    }

    fn publish(&self) {
        self.aggregate.update(|_| {
            let entries = self.entries.lock();
            let snapshot = entries
                .iter()
                .map(|(id, e)| {
                    let view = EntrySnapshot {
                        state: e.state.last(),
                        is_closed: e.closed,
                        error: e.error.clone(),
                        done: e.done.clone(),
                    };
                    (*id, view)
                })
                .collect();
            Arc::new(snapshot)
        });
    }
}

impl<A: Adapter> Drop for ConnRegistry<A> {
    fn drop(&mut self) {
        for entry in self.entries.get_mut().values() {
            Self::stop(&self.adapter, entry);
        }
        self.aggregate.close();
    }
}

/// Runs handler then cleanup for one entry and reports the outcome.
async fn run_entry<A: Adapter>(
    adapter: Arc<A>,
    handle: AdapterHandle<A>,
    registry: Weak<ConnRegistry<A>>,
    done: oneshot::Sender<EntryOutcome>,
) {
    let id = handle.id();

    let handled = guarded(adapter.handle(&handle)).await;
    let cleaned = guarded(adapter.cleanup(&handle, handled.clone().err())).await;
    let outcome = cleaned.and(handled);

    match &outcome {
        Ok(()) => tracing::debug!(%id, "Registry entry finished"),
        Err(e) => tracing::warn!(%id, error = %e, label = e.as_label(), "Registry entry failed"),
    }

    let registry = registry.upgrade();
    if let Some(registry) = &registry {
        registry.finish(id, &outcome);
    }
    let _ = done.send(outcome);
    if let Some(registry) = &registry {
        registry.publish();
    }
}

/// Awaits `fut`, turning a panic into [`HandlerError::Panicked`].
async fn guarded<F>(fut: F) -> Result<(), HandlerError>
where
    F: Future<Output = Result<(), HandlerError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(HandlerError::Panicked(panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
