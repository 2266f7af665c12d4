use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use battery_es::battery::memory::battery_store_builder;
use battery_es::battery::{Battery, BatteryEvent, HealthStatus, RemovalReason};
use battery_es::handler::TransactionalEventHandler;
use battery_es::rebuilder::{RebuildReport, Rebuilder};
use battery_es::store::memory::MemoryTransaction;
use battery_es::store::{StoreError, StoreEvent};

use crate::common;
use crate::memory::{service_over, MemoryService};

async fn run_scenario(service: &MemoryService) {
    let first = service.register(common::register("SN-R1")).await.unwrap();
    let second = service.register(common::register("SN-R2")).await.unwrap();
    let third = service.register(common::register("SN-R3")).await.unwrap();

    service.install(common::install(first, 1, 12.4)).await.unwrap();
    service.install(common::install(third, 3, 13.1)).await.unwrap();
    service
        .record_maintenance(common::maintenance(first, 12.1, HealthStatus::Fair))
        .await
        .unwrap();
    service.replace(common::replace(first, second, 1)).await.unwrap();
    service
        .record_maintenance(common::maintenance(second, 12.6, HealthStatus::Good))
        .await
        .unwrap();
    service.remove(common::remove(third, RemovalReason::Upgrade)).await.unwrap();
    service.dispose(common::dispose(third)).await.unwrap();
}

#[tokio::test]
async fn rebuild_reproduces_the_live_tables() {
    let store = battery_store_builder().build();
    let service = service_over(store.clone());
    run_scenario(&service).await;

    let live = store.tables().await;
    let counts_before = service.projection_counts().await.unwrap();

    let (report, counts) = service.rebuild_projections().await.unwrap();

    assert_eq!(
        report,
        RebuildReport {
            replayed: store.last_position().await as usize,
            caught_up: 0,
        }
    );
    assert_eq!(counts, counts_before);
    assert_eq!(*store.tables().await, *live);

    // Idempotent.
    service.rebuild_projections().await.unwrap();
    assert_eq!(*store.tables().await, *live);
}

#[tokio::test]
async fn rebuild_of_an_empty_store_is_empty() {
    let store = battery_store_builder().build();

    let report = store.rebuild().await.unwrap();

    assert_eq!(report, RebuildReport::default());
    assert_eq!(*store.tables().await, Default::default());
}

#[tokio::test]
async fn rebuild_alongside_commands_loses_nothing() {
    let store = battery_store_builder().build();
    let service = service_over(store.clone());

    let (_, rebuilt) = tokio::join!(run_scenario(&service), async {
        tokio::task::yield_now().await;
        store.rebuild().await
    });
    rebuilt.unwrap();

    let live = store.tables().await;
    store.rebuild().await.unwrap();
    assert_eq!(*store.tables().await, *live);
    assert_eq!(service.projection_counts().await.unwrap().audit_entries, 11);
}

/// Fails on any event past the first `accepted` ones.
struct FailAfter {
    accepted: usize,
    seen: AtomicUsize,
}

#[async_trait]
impl TransactionalEventHandler<Battery, StoreError, MemoryTransaction> for FailAfter {
    async fn handle(&self, _: &StoreEvent<BatteryEvent>, _: &mut MemoryTransaction) -> Result<(), StoreError> {
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.accepted {
            Ok(())
        } else {
            Err(StoreError::Custom("projection exhausted".into()))
        }
    }
}

#[tokio::test]
async fn failed_rebuild_leaves_the_live_tables_alone() {
    let store = battery_store_builder()
        .add_transactional_event_handler(FailAfter {
            accepted: 2,
            seen: AtomicUsize::new(0),
        })
        .build();
    let service = service_over(store.clone());

    let battery_id = service.register(common::register("SN-R9")).await.unwrap();
    service.install(common::install(battery_id, 9, 12.0)).await.unwrap();
    let live = store.tables().await;

    assert!(store.rebuild().await.is_err());

    assert_eq!(*store.tables().await, *live);
    assert_eq!(service.projection_counts().await.unwrap().audit_entries, 2);
}
