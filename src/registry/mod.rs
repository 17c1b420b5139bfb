//! # Connection registry.
//!
//! Transport-agnostic supervision of many independently keyed entries:
//! - [`ConnRegistry`] owns entries and the aggregate snapshot bus
//! - [`Adapter`] caller-supplied policy: initial config/state, handler, cleanup
//! - [`AdapterHandle`] what a running handler sees of its entry
//! - [`EntrySnapshot`], [`RegistrySnapshot`] aggregate view

mod adapter;
mod conn_registry;
mod entry;

pub use adapter::{Adapter, AdapterHandle};
pub use conn_registry::ConnRegistry;
pub use entry::{Completion, EntryId, EntryOutcome, EntrySnapshot, RegistrySnapshot};
