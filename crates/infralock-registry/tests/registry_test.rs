//! Registry Integration Tests
//!
//! Endpoint records and configuration watches sharing one store.

use std::sync::Arc;

use infralock_common::CancelSignal;
use infralock_registry::{
    ConfigWatcher, EndpointRegistry, InitEndpoint, ServiceEndpoint, WatchExit,
};
use infralock_store::MemoryStore;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_watcher_sees_registry_updates() {
    let store = MemoryStore::new();
    let registry = EndpointRegistry::new(Arc::new(store.clone()));
    let watcher = ConfigWatcher::<ServiceEndpoint>::new(Arc::new(store.clone()));
    let (tx, mut rx) = mpsc::channel(4);
    let cancel = CancelSignal::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.run("/endpoints/billing", tx, &cancel).await })
    };
    while store.watcher_count("/endpoints/billing") == 0 {
        tokio::task::yield_now().await;
    }

    let endpoint = ServiceEndpoint::new("billing.internal", 7000);
    registry.put("/endpoints/billing", &endpoint).await.unwrap();
    registry
        .put("/endpoints/billing", &endpoint.clone().with_init(true))
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap(), endpoint);
    assert!(rx.recv().await.unwrap().init);

    cancel.cancel();
    assert_eq!(task.await.unwrap().unwrap(), WatchExit::Cancelled);
    assert_eq!(store.watcher_count("/endpoints/billing"), 0);
}

#[tokio::test]
async fn test_records_are_not_lease_bound() {
    let store = MemoryStore::new();
    let registry = EndpointRegistry::new(Arc::new(store.clone()));

    registry
        .put("/init/billing", &InitEndpoint { init: true })
        .await
        .unwrap();

    assert_eq!(store.lease_count(), 0);
    let read: Option<InitEndpoint> = registry.get("/init/billing").await.unwrap();
    assert_eq!(read, Some(InitEndpoint { init: true }));
}

#[tokio::test]
async fn test_cancel_before_any_update() {
    let store = MemoryStore::new();
    let watcher = ConfigWatcher::<InitEndpoint>::new(Arc::new(store));
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancelSignal::new();
    cancel.cancel();

    let exit = watcher.run("/init/billing", tx, &cancel).await.unwrap();
    assert_eq!(exit, WatchExit::Cancelled);
}
