use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use peervisor::{
    Adapter, AdapterHandle, ConnRegistry, EntryId, HandlerError, RegistryError, RegistrySnapshot,
};

#[derive(Clone, Debug, Default)]
struct DummyConfig {
    n: i64,
    done: bool,
    fail: Option<HandlerError>,
    panic: bool,
    removed: bool,
}

impl DummyConfig {
    fn n(n: i64) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }

    fn done(n: i64) -> Self {
        Self {
            n,
            done: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct DummyState {
    n: i64,
}

struct DummyInit {
    n: i64,
}

#[derive(Default)]
struct DummyAdapter {
    cleanup_error: Option<HandlerError>,
    cleanups: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<DummyConfig>>>,
}

#[async_trait]
impl Adapter for DummyAdapter {
    type Conn = ();
    type InitData = DummyInit;
    type Config = DummyConfig;
    type State = DummyState;

    fn make_initial_config(&self, _: &(), _: &DummyInit, _: EntryId) -> DummyConfig {
        DummyConfig::n(1)
    }

    fn make_initial_state(&self, _: &(), _: &DummyConfig, _: &DummyInit, _: EntryId) -> DummyState {
        DummyState { n: 1 }
    }

    fn modify_config_on_remove(&self, config: &DummyConfig) -> DummyConfig {
        DummyConfig {
            removed: true,
            ..config.clone()
        }
    }

    async fn handle(&self, handle: &AdapterHandle<Self>) -> Result<(), HandlerError> {
        while let Some(config) = handle.next_config().await {
            self.seen.lock().push(config.clone());
            if config.panic {
                panic!("handler exploded");
            }
            if config.done {
                return match config.fail {
                    Some(err) => Err(err),
                    None => Ok(()),
                };
            }
            handle.set_state(DummyState {
                n: handle.init_data().n * config.n,
            });
        }
        Ok(())
    }

    async fn cleanup(
        &self,
        _handle: &AdapterHandle<Self>,
        error: Option<HandlerError>,
    ) -> Result<(), HandlerError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.cleanup_error {
            return Err(err.clone());
        }
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Waits until a published snapshot satisfies `pred`.
async fn wait_for<F>(registry: &ConnRegistry<DummyAdapter>, pred: F) -> RegistrySnapshot<DummyState>
where
    F: Fn(&RegistrySnapshot<DummyState>) -> bool,
{
    let mut rx = registry.state_bus().subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = rx.recv().await.expect("registry bus closed");
            if pred(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("condition not met in time")
}

#[tokio::test]
async fn new_entry_state_combines_init_data_and_config() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let id = registry.add_conn((), DummyInit { n: 2 });

    let snapshot = wait_for(&registry, |s| s.get(&id).is_some_and(|e| e.state.n == 2)).await;
    let entry = &snapshot[&id];
    assert!(!entry.is_closed);
    assert!(entry.error.is_none());
}

#[tokio::test]
async fn config_updates_reach_the_handler() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let id = registry.add_conn((), DummyInit { n: 2 });

    registry.set_config(id, DummyConfig::n(10)).unwrap();
    let snapshot = wait_for(&registry, |s| s.get(&id).is_some_and(|e| e.state.n == 20)).await;
    assert!(!snapshot[&id].is_closed);

    registry
        .update_config(id, |c| DummyConfig::n(c.n + 5))
        .unwrap();
    wait_for(&registry, |s| s.get(&id).is_some_and(|e| e.state.n == 30)).await;
}

#[tokio::test]
async fn returning_handler_closes_entry_without_error() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let id = registry.add_conn((), DummyInit { n: 2 });

    registry.set_config(id, DummyConfig::done(10)).unwrap();

    let snapshot = wait_for(&registry, |s| s.get(&id).is_some_and(|e| e.is_closed)).await;
    assert!(snapshot[&id].error.is_none());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn failing_handler_records_its_error() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let id = registry.add_conn((), DummyInit { n: 2 });
    let whoopsie = HandlerError::msg("whoopsie");

    registry
        .set_config(
            id,
            DummyConfig {
                fail: Some(whoopsie.clone()),
                ..DummyConfig::done(10)
            },
        )
        .unwrap();

    let snapshot = wait_for(&registry, |s| s.get(&id).is_some_and(|e| e.is_closed)).await;
    let recorded = snapshot[&id].error.as_ref().expect("error recorded");
    assert!(recorded.same_as(&whoopsie));
}

#[tokio::test]
async fn completion_resolves_with_outcome() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let id = registry.add_conn((), DummyInit { n: 2 });
    let whoopsie = HandlerError::msg("whoopsie");
    let done = registry.snapshot()[&id].done.clone();

    registry
        .set_config(
            id,
            DummyConfig {
                fail: Some(whoopsie.clone()),
                ..DummyConfig::done(10)
            },
        )
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), done)
        .await
        .expect("entry did not complete");
    assert!(outcome.unwrap_err().same_as(&whoopsie));
}

#[tokio::test]
async fn cleanup_error_supersedes_handler_error() {
    let cleanup_error = HandlerError::msg("cleanup failed");
    let adapter = DummyAdapter {
        cleanup_error: Some(cleanup_error.clone()),
        ..DummyAdapter::default()
    };
    let cleanups = Arc::clone(&adapter.cleanups);
    let registry = ConnRegistry::new(adapter);
    let id = registry.add_conn((), DummyInit { n: 2 });

    registry
        .set_config(
            id,
            DummyConfig {
                fail: Some(HandlerError::msg("handler failed")),
                ..DummyConfig::done(1)
            },
        )
        .unwrap();

    let snapshot = wait_for(&registry, |s| s.get(&id).is_some_and(|e| e.is_closed)).await;
    assert!(snapshot[&id].error.as_ref().unwrap().same_as(&cleanup_error));
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_handler_is_isolated() {
    let adapter = DummyAdapter::default();
    let cleanups = Arc::clone(&adapter.cleanups);
    let registry = ConnRegistry::new(adapter);
    let broken = registry.add_conn((), DummyInit { n: 2 });
    let healthy = registry.add_conn((), DummyInit { n: 3 });

    registry
        .set_config(
            broken,
            DummyConfig {
                panic: true,
                ..DummyConfig::n(1)
            },
        )
        .unwrap();
    registry.set_config(healthy, DummyConfig::n(10)).unwrap();

    let snapshot = wait_for(&registry, |s| {
        s.get(&broken).is_some_and(|e| e.is_closed)
            && s.get(&healthy).is_some_and(|e| e.state.n == 30)
    })
    .await;

    let err = snapshot[&broken].error.as_ref().expect("panic recorded");
    assert_eq!(err.as_label(), "handler_panicked");
    assert!(!snapshot[&healthy].is_closed);
    assert_eq!(cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn closed_entry_stays_until_removed() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let id = registry.add_conn((), DummyInit { n: 2 });
    registry.set_config(id, DummyConfig::done(1)).unwrap();
    wait_for(&registry, |s| s.get(&id).is_some_and(|e| e.is_closed)).await;

    assert!(registry.remove_conn(id));
    assert!(!registry.snapshot().contains_key(&id));
    assert!(registry.is_empty());

    assert!(!registry.remove_conn(id));
    assert!(!registry.snapshot().contains_key(&id));
}

#[tokio::test]
async fn running_entry_can_be_removed() {
    let adapter = DummyAdapter::default();
    let seen = Arc::clone(&adapter.seen);
    let registry = ConnRegistry::new(adapter);
    let id = registry.add_conn((), DummyInit { n: 2 });
    let done = registry.snapshot()[&id].done.clone();

    registry.set_config(id, DummyConfig::n(1)).unwrap();
    assert!(registry.remove_conn(id));
    assert!(!registry.snapshot().contains_key(&id));

    let outcome = tokio::time::timeout(Duration::from_secs(2), done)
        .await
        .expect("handler did not stop after removal");
    assert!(outcome.is_ok());

    let seen = seen.lock();
    assert!(seen.last().is_some_and(|c| c.removed));
    assert!(!registry.snapshot().contains_key(&id));
}

#[tokio::test]
async fn unknown_ids_are_rejected() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let id = registry.add_conn((), DummyInit { n: 2 });
    assert!(registry.remove_conn(id));

    assert_eq!(
        registry.set_config(id, DummyConfig::n(3)),
        Err(RegistryError::UnknownEntry(id))
    );
    assert_eq!(
        registry.update_config(id, |c| c.clone()),
        Err(RegistryError::UnknownEntry(id))
    );
    assert!(!registry.remove_conn(id));
}

#[tokio::test]
async fn aggregate_is_replayed_to_new_subscribers() {
    let registry = ConnRegistry::new(DummyAdapter::default());
    let a = registry.add_conn((), DummyInit { n: 1 });
    let b = registry.add_conn((), DummyInit { n: 1 });
    assert_ne!(a, b);

    let mut rx = registry.state_bus().subscribe();
    let first = rx.try_recv().expect("current snapshot replayed");
    assert_eq!(first.len(), 2);
    assert!(first.contains_key(&a) && first.contains_key(&b));
}
