use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use battery_es::battery::memory::battery_store_builder;
use battery_es::battery::{
    Battery, BatteryCommand, BatteryError, BatteryEvent, BatteryRegistered, BatteryState, CommandError, HealthStatus,
    MaintenanceType,
};
use battery_es::handler::TransactionalEventHandler;
use battery_es::manager::AggregateManager;
use battery_es::projection::ProjectionError;
use battery_es::store::memory::MemoryTransaction;
use battery_es::store::{EventStore, StoreError, StoreEvent};
use battery_es::{Aggregate, AggregateState};

use crate::common;
use crate::memory::service_over;

fn maintenance_command() -> BatteryCommand {
    BatteryCommand::RecordMaintenance {
        maintenance_id: Uuid::new_v4(),
        maintenance_type: MaintenanceType::Charging,
        voltage_reading: 12.9,
        health_status: HealthStatus::Excellent,
        notes: String::new(),
        performed_by: "Carla Gomez".to_string(),
        recorded_at: Utc::now(),
    }
}

#[tokio::test]
async fn only_one_of_two_writers_at_the_same_version_wins() {
    let store = battery_store_builder().build();
    let service = service_over(store.clone());

    let battery_id = service.register(common::register("SN-C1")).await.unwrap();
    service.install(common::install(battery_id, 1, 12.0)).await.unwrap();

    let manager = AggregateManager::new(store.clone());
    let mut first = manager.load(battery_id).await.unwrap().unwrap();
    let mut second = manager.load(battery_id).await.unwrap().unwrap();
    assert_eq!(*first.sequence_number(), 2);

    let first_events = Battery::handle_command(first.inner(), maintenance_command()).unwrap();
    let second_events = Battery::handle_command(second.inner(), maintenance_command()).unwrap();

    let (first_result, second_result) = tokio::join!(
        store.persist(&mut first, first_events),
        store.persist(&mut second, second_events)
    );

    let conflicts: Vec<&StoreError> = [&first_result, &second_result]
        .into_iter()
        .filter_map(|result| result.as_ref().err())
        .collect();
    assert_eq!(conflicts.len(), 1);

    let conflict = conflicts[0].as_conflict().unwrap();
    assert_eq!(conflict.aggregate_id, battery_id);
    assert_eq!(conflict.expected, 2);
    assert_eq!(conflict.actual, Some(3));
    assert!(conflict.to_string().contains("reload and retry"));

    assert_eq!(store.version(battery_id).await, 3);
    assert_eq!(service.maintenance_history(battery_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn stale_state_surfaces_as_a_retryable_command_error() {
    let store = battery_store_builder().build();
    let service = service_over(store.clone());

    let battery_id = service.register(common::register("SN-C2")).await.unwrap();
    service.install(common::install(battery_id, 2, 12.0)).await.unwrap();

    let manager = AggregateManager::new(store.clone());
    let mut stale = manager.load(battery_id).await.unwrap().unwrap();

    service
        .record_maintenance(common::maintenance(battery_id, 12.2, HealthStatus::Good))
        .await
        .unwrap();

    let error = manager
        .handle_command::<CommandError>(&mut stale, maintenance_command())
        .await
        .unwrap_err();

    assert!(error.is_retryable());
    assert!(matches!(error, CommandError::Conflict(_)));
    assert_eq!(*stale.sequence_number(), 2);

    let mut fresh = manager.load(battery_id).await.unwrap().unwrap();
    assert!(manager
        .handle_command::<CommandError>(&mut fresh, maintenance_command())
        .await
        .is_ok());
    assert_eq!(*fresh.sequence_number(), 4);
}

#[tokio::test]
async fn serial_index_rolls_back_an_append_that_slipped_past_validation() {
    let store = battery_store_builder().build();
    let service = service_over(store.clone());

    service.register(common::register("SN-C3")).await.unwrap();

    // Bypasses the command service, as a concurrent registration would.
    let battery_id = Uuid::new_v4();
    let mut state: AggregateState<BatteryState> = AggregateState::with_id(battery_id);
    let error = store
        .persist(
            &mut state,
            vec![BatteryEvent::Registered(BatteryRegistered {
                battery_id,
                serial_number: "SN-C3".to_string(),
                model: "AGM-70".to_string(),
                brand: "Varta".to_string(),
                registration_date: Utc::now(),
                registered_by: "Alice Martin".to_string(),
            })],
        )
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        StoreError::Projection(ProjectionError::UniqueViolation { .. })
    ));
    assert!(matches!(
        CommandError::from(error),
        CommandError::Validation(BatteryError::DuplicateSerial(serial)) if serial == "SN-C3"
    ));

    assert_eq!(store.version(battery_id).await, 0);
    assert_eq!(*state.sequence_number(), 0);

    let counts = service.projection_counts().await.unwrap();
    assert_eq!(counts.batteries, 1);
    assert_eq!(counts.audit_entries, 1);
}

/// Takes its time over installs.
struct SlowInstalls;

#[async_trait]
impl TransactionalEventHandler<Battery, StoreError, MemoryTransaction> for SlowInstalls {
    async fn handle(&self, event: &StoreEvent<BatteryEvent>, _: &mut MemoryTransaction) -> Result<(), StoreError> {
        if matches!(event.payload, BatteryEvent::Installed(_)) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(())
    }
}

#[tokio::test]
async fn an_append_dropped_mid_transaction_leaves_the_projections_intact() {
    let store = battery_store_builder().add_transactional_event_handler(SlowInstalls).build();
    let service = service_over(store.clone());

    let battery_id = service.register(common::register("SN-X1")).await.unwrap();
    let before = service.projection_counts().await.unwrap();
    assert_eq!(before.batteries, 1);
    assert_eq!(before.audit_entries, 1);

    let timed_out = tokio::time::timeout(
        Duration::from_millis(5),
        service.install(common::install(battery_id, 3, 12.4)),
    )
    .await;
    assert!(timed_out.is_err());

    assert_eq!(service.projection_counts().await.unwrap(), before);
    assert_eq!(store.version(battery_id).await, 1);

    service.install(common::install(battery_id, 3, 12.4)).await.unwrap();

    let counts = service.projection_counts().await.unwrap();
    assert_eq!(counts.batteries, 1);
    assert_eq!(counts.equipment, 1);
    assert_eq!(counts.audit_entries, 2);
    assert_eq!(service.equipment_battery(3).await.unwrap().unwrap().current_battery_id, Some(battery_id));
}
