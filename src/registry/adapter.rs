//! # Adapter contract.
//!
//! An [`Adapter`] decides how a registry entry starts, reacts to configuration
//! and cleans up. The registry hands each running handler an [`AdapterHandle`]:
//!
//! ```text
//!  caller ── set_config ──► config bus ──► AdapterHandle::next_config() ──► handler
//!  handler ── AdapterHandle::set_state() ──► state bus ──► registry aggregate
//! ```
//!
//! ## Rules
//! - Only the caller writes configuration; only the handler writes state.
//! - `next_config()` yields the initial config first, then every later one in order,
//!   then `None` once the entry is removed.
//! - Removal is cooperative: the handler observes it through `next_config()` or `cancelled()`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusReceiver, StickyBus, StickySubscribable};
use crate::error::HandlerError;
use crate::registry::entry::EntryId;

/// Policy driving the entries of a [`ConnRegistry`](crate::registry::ConnRegistry).
///
/// # Example
/// ```rust,ignore
/// struct Echo;
///
/// #[async_trait]
/// impl Adapter for Echo {
///     type Conn = Arc<ManagedDataConnection>;
///     type InitData = ();
///     type Config = bool;
///     type State = usize;
///
///     fn make_initial_config(&self, _: &Self::Conn, _: &(), _: EntryId) -> bool { true }
///     fn make_initial_state(&self, _: &Self::Conn, _: &bool, _: &(), _: EntryId) -> usize { 0 }
///
///     async fn handle(&self, h: &AdapterHandle<Self>) -> Result<(), HandlerError> {
///         let mut echoed = 0;
///         while let Ok(msg) = h.conn().message_queue().receive().await {
///             h.conn().send(msg).map_err(HandlerError::new)?;
///             echoed += 1;
///             h.set_state(echoed);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Adapter: Send + Sync + Sized + 'static {
    /// Connection-like payload, opaque to the registry.
    type Conn: Send + Sync + 'static;
    /// Caller-supplied seed passed to `add_conn`.
    type InitData: Send + Sync + 'static;
    /// Caller-owned configuration.
    type Config: Clone + Send + Sync + 'static;
    /// Adapter-owned state.
    type State: Clone + Send + Sync + 'static;

    /// Builds the first configuration of a new entry.
    fn make_initial_config(
        &self,
        conn: &Self::Conn,
        init_data: &Self::InitData,
        id: EntryId,
    ) -> Self::Config;

    /// Builds the first state of a new entry.
    fn make_initial_state(
        &self,
        conn: &Self::Conn,
        config: &Self::Config,
        init_data: &Self::InitData,
        id: EntryId,
    ) -> Self::State;

    /// Last configuration delivered to the handler when its entry is removed.
    fn modify_config_on_remove(&self, config: &Self::Config) -> Self::Config {
        config.clone()
    }

    /// Supervises one entry until it returns or fails.
    async fn handle(&self, handle: &AdapterHandle<Self>) -> Result<(), HandlerError>;

    /// Runs exactly once after [`handle`](Self::handle), with its error if any.
    ///
    /// An error returned here replaces the handler's.
    async fn cleanup(
        &self,
        handle: &AdapterHandle<Self>,
        error: Option<HandlerError>,
    ) -> Result<(), HandlerError> {
        let _ = (handle, error);
        Ok(())
    }
}

/// Handler-facing view of one entry.
pub struct AdapterHandle<A: Adapter> {
    id: EntryId,
    conn: A::Conn,
    init_data: A::InitData,
    config: StickySubscribable<A::Config>,
    configs: Mutex<BusReceiver<A::Config>>,
    state: StickyBus<A::State>,
    on_state: Arc<dyn Fn() + Send + Sync>,
    cancel: CancellationToken,
}

impl<A: Adapter> AdapterHandle<A> {
    pub(crate) fn new(
        id: EntryId,
        conn: A::Conn,
        init_data: A::InitData,
        config: &StickyBus<A::Config>,
        state: StickyBus<A::State>,
        on_state: Arc<dyn Fn() + Send + Sync>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            conn,
            init_data,
            configs: Mutex::new(config.subscribe()),
            config: config.subscribable(),
            state,
            on_state,
            cancel,
        }
    }

    /// Entry id.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The supervised payload.
    pub fn conn(&self) -> &A::Conn {
        &self.conn
    }

    /// Seed passed to `add_conn`.
    pub fn init_data(&self) -> &A::InitData {
        &self.init_data
    }

    /// Read-only configuration bus, for callback-style observers.
    pub fn config_bus(&self) -> StickySubscribable<A::Config> {
        self.config.clone()
    }

    /// Latest configuration, without consuming the stream.
    pub fn current_config(&self) -> A::Config {
        self.config.last()
    }

    /// Next configuration in FIFO order; `None` once the entry was removed
    /// and every pending value was read.
    pub async fn next_config(&self) -> Option<A::Config> {
        self.configs.lock().await.recv().await
    }

    /// Publishes a new state for this entry.
    pub fn set_state(&self, state: A::State) {
        self.state.emit(state);
        (self.on_state)();
    }

    /// Latest state set through [`set_state`](Self::set_state).
    pub fn state(&self) -> A::State {
        self.state.last()
    }

    /// Resolves when the entry is removed from the registry.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Returns true once the entry was removed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
