//! Integration tests for the pool manager: registration, endpoint eviction and health sweeps.

use crate::mock_infrastructure::{StakeTable, ValidatorMockBuilder};
use gateway_core::{
    client::BackendClient,
    pool::PoolManager,
    router::Router,
    store::{RegistryStore, SqliteStore},
    types::BackendRecord,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;

async fn create_manager() -> (Arc<PoolManager>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
    let client = Arc::new(BackendClient::new(16).expect("http client"));
    let manager = Arc::new(PoolManager::new(
        store.clone(),
        client,
        Duration::from_secs(1),
        Duration::from_millis(50),
    ));
    (manager, store)
}

#[tokio::test]
async fn test_same_endpoint_evicts_previous_identity() {
    let (manager, store) = create_manager().await;

    manager
        .register_or_update(BackendRecord::new("old", "10.0.0.9", 8091, "t1"))
        .await
        .expect("first registration");
    manager
        .register_or_update(BackendRecord::new("new", "10.0.0.9", 8091, "t2"))
        .await
        .expect("second registration");

    let records = store.list_backends().await.expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity, "new");

    assert!(manager.live_pool().contains("new"));
    assert!(!manager.live_pool().contains("old"));

    let stakes = StakeTable::new(&[("old", 5000.0), ("new", 5000.0)]);
    let router = Router::new(manager.live_pool(), Arc::new(stakes), 1000.0, Vec::new());
    for _ in 0..200 {
        let selected = router.select().expect("a live validator");
        assert_eq!(selected.identity, "new");
        assert_eq!(selected.message, "t2");
    }
}

#[tokio::test]
async fn test_reregistration_updates_in_place() {
    let (manager, store) = create_manager().await;

    manager
        .register_or_update(BackendRecord::new("v1", "10.0.0.1", 8091, "t1"))
        .await
        .expect("first registration");
    manager
        .register_or_update(BackendRecord::new("v1", "10.0.0.2", 9000, "t2"))
        .await
        .expect("re-registration");

    let records = store.list_backends().await.expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].endpoint, "http://10.0.0.2:9000");
    assert_eq!(records[0].message, "t2");
    assert_eq!(manager.live_pool().snapshot()["v1"].message, "t2");
}

#[tokio::test]
async fn test_refresh_keeps_only_healthy_validators() {
    let (manager, store) = create_manager().await;

    let mut healthy = ValidatorMockBuilder::new().await;
    healthy.mock_health();
    let mut degraded = ValidatorMockBuilder::new().await;
    degraded.mock_health_status(503);

    store.upsert_backend(&healthy.record("healthy")).await.expect("insert");
    store.upsert_backend(&degraded.record("degraded")).await.expect("insert");
    store
        .upsert_backend(&BackendRecord::new("gone", "127.0.0.1", 1, "t"))
        .await
        .expect("insert");

    assert_eq!(manager.refresh().await.expect("refresh"), 1);

    let snapshot = manager.live_pool().snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key("healthy"));

    // unreachable validators stay registered for the next sweep
    assert_eq!(store.list_backends().await.expect("list").len(), 3);
}

#[tokio::test]
async fn test_background_sweep_stops_on_shutdown() {
    let (manager, store) = create_manager().await;

    let mut healthy = ValidatorMockBuilder::new().await;
    healthy.mock_health();
    store.upsert_backend(&healthy.record("v1")).await.expect("insert");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let handle = manager.start_with_shutdown(shutdown_tx.subscribe());

    tokio::time::timeout(Duration::from_secs(5), async {
        while !manager.live_pool().contains("v1") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first sweep populates the pool");

    shutdown_tx.send(()).expect("receiver alive");
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("task exits")
        .expect("task did not panic");
}
