// Refresh worker: periodic refresh, failure tolerance, shutdown

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::*;
use ucdn_exporter::models::Entity;
use ucdn_exporter::registry::EntityRegistry;
use ucdn_exporter::worker::{RefreshConfig, RefreshDeps, spawn};

#[tokio::test(start_paused = true)]
async fn worker_refreshes_on_each_tick_and_stops_on_shutdown() {
    let source = three_domains();
    let registry = Arc::new(EntityRegistry::new(source.clone(), "org-test"));
    registry.refresh().await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = spawn(
        RefreshDeps {
            registry: registry.clone(),
            shutdown_rx,
        },
        RefreshConfig {
            ticker_time_secs: 10,
        },
    );

    source.set_entities(vec![Entity::new("ucdn-9", "z.example.com")]);
    tokio::time::sleep(tokio::time::Duration::from_secs(25)).await;
    assert_eq!(source.listing_calls.load(Ordering::SeqCst), 3);
    assert_eq!(registry.current().unwrap().entities[0].id, "ucdn-9");

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn worker_keeps_snapshot_when_refresh_fails() {
    let source = three_domains();
    let registry = Arc::new(EntityRegistry::new(source.clone(), "org-test"));
    let before = registry.refresh().await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = spawn(
        RefreshDeps {
            registry: registry.clone(),
            shutdown_rx,
        },
        RefreshConfig {
            ticker_time_secs: 5,
        },
    );

    source.set_listing_failure(true);
    tokio::time::sleep(tokio::time::Duration::from_secs(16)).await;
    assert!(source.listing_calls.load(Ordering::SeqCst) >= 3);
    assert_eq!(registry.current().unwrap(), before);

    let _ = shutdown_tx.send(());
    handle.await.unwrap();
}
