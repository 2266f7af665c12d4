use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use battery_es::battery::memory::battery_store_builder;
use battery_es::battery::{Battery, BatteryError, BatteryEvent, BatteryStatus, CommandError, RemovalReason};
use battery_es::handler::TransactionalEventHandler;
use battery_es::store::memory::MemoryTransaction;
use battery_es::store::{StoreError, StoreEvent};
use uuid::Uuid;

use crate::common;
use crate::memory::{service, service_over};

#[tokio::test]
async fn replace_removes_the_old_battery_and_installs_the_new_one() {
    let service = service();

    let old = service.register(common::register("SN-A")).await.unwrap();
    let new = service.register(common::register("SN-B")).await.unwrap();
    service.install(common::install(old, 7, 12.3)).await.unwrap();

    let replaced_by = service.replace(common::replace(old, new, 7)).await.unwrap();
    assert_eq!(replaced_by, new);

    let old_row = service.battery(old).await.unwrap().unwrap().battery;
    assert_eq!(old_row.status, BatteryStatus::Removed);
    assert_eq!(old_row.current_equipment_id, None);

    let new_row = service.battery(new).await.unwrap().unwrap().battery;
    assert_eq!(new_row.status, BatteryStatus::Installed);
    assert_eq!(new_row.current_equipment_id, Some(7));

    let equipment = service.equipment_battery(7).await.unwrap().unwrap();
    assert_eq!(equipment.current_battery_id, Some(new));
    assert_eq!(equipment.current_battery_serial_number.as_deref(), Some("SN-B"));
    assert_eq!(equipment.history.len(), 2);
    assert_eq!(equipment.history[0].battery_id, old);
    assert_eq!(equipment.history[0].removal_reason, Some(RemovalReason::Defective));
    assert!(equipment.history[0].removed_date.is_some());
    assert_eq!(equipment.history[1].battery_id, new);
    assert!(equipment.history[1].removed_date.is_none());

    let old_events = service.battery_events(old).await.unwrap();
    assert!(matches!(old_events.last().map(|e| &e.payload), Some(BatteryEvent::Replaced(_))));

    // The replaced battery can go on to be disposed.
    service.dispose(common::dispose(old)).await.unwrap();
}

#[tokio::test]
async fn replacement_can_be_resolved_by_serial_number() {
    let service = service();

    let old = service.register(common::register("SN-C")).await.unwrap();
    let new = service.register(common::register("SN-D")).await.unwrap();
    service.install(common::install(old, 8, 12.3)).await.unwrap();

    let mut request = common::replace(old, new, 8);
    request.new_battery_id = None;
    request.new_serial_number = "SN-D".to_string();

    assert_eq!(service.replace(request).await.unwrap(), new);

    let mut request = common::replace(new, Uuid::new_v4(), 8);
    request.new_battery_id = None;
    request.new_serial_number = "SN-UNKNOWN".to_string();

    let error = service.replace(request).await.unwrap_err();
    assert!(matches!(error, CommandError::UnknownSerial(serial) if serial == "SN-UNKNOWN"));
}

#[tokio::test]
async fn rejected_replacement_writes_nothing() {
    let service = service();

    let old = service.register(common::register("SN-E")).await.unwrap();
    let new = service.register(common::register("SN-F")).await.unwrap();
    service.install(common::install(old, 9, 12.3)).await.unwrap();

    let mut request = common::replace(old, new, 9);
    request.initial_voltage = 9.5;

    let error = service.replace(request).await.unwrap_err();
    assert!(matches!(
        error,
        CommandError::Validation(BatteryError::VoltageOutOfRange { .. })
    ));

    assert_eq!(service.event_store().version(old).await, 2);
    assert_eq!(service.event_store().version(new).await, 1);

    let equipment = service.equipment_battery(9).await.unwrap().unwrap();
    assert_eq!(equipment.current_battery_id, Some(old));

    let error = service.replace(common::replace(old, old, 9)).await.unwrap_err();
    assert!(matches!(
        error,
        CommandError::Validation(BatteryError::SelfReplacement(id)) if id == old
    ));
}

#[tokio::test]
async fn replacement_on_another_equipment_is_rejected() {
    let service = service();

    let old = service.register(common::register("SN-M1")).await.unwrap();
    let new = service.register(common::register("SN-M2")).await.unwrap();
    service.install(common::install(old, 7, 12.3)).await.unwrap();

    let error = service.replace(common::replace(old, new, 8)).await.unwrap_err();
    assert!(matches!(
        error,
        CommandError::Validation(BatteryError::EquipmentMismatch {
            installed_on: 7,
            requested: 8,
        })
    ));

    assert_eq!(service.event_store().version(old).await, 2);
    assert_eq!(service.event_store().version(new).await, 1);

    let equipment = service.equipment_battery(7).await.unwrap().unwrap();
    assert_eq!(equipment.current_battery_id, Some(old));
    assert!(service.equipment_battery(8).await.unwrap().is_none());
    assert_eq!(
        service.battery(new).await.unwrap().unwrap().battery.status,
        BatteryStatus::New
    );
}

/// Refuses the first install of one battery.
struct RefuseFirstInstall {
    battery_id: Uuid,
    refused: Arc<AtomicBool>,
}

#[async_trait]
impl TransactionalEventHandler<Battery, StoreError, MemoryTransaction> for RefuseFirstInstall {
    async fn handle(&self, event: &StoreEvent<BatteryEvent>, _: &mut MemoryTransaction) -> Result<(), StoreError> {
        match &event.payload {
            BatteryEvent::Installed(installed)
                if installed.battery_id == self.battery_id && !self.refused.swap(true, Ordering::SeqCst) =>
            {
                Err(StoreError::Custom("install refused".into()))
            }
            _ => Ok(()),
        }
    }
}

#[tokio::test]
async fn failed_install_leaves_an_incomplete_replacement_that_can_be_completed() {
    let new = Uuid::new_v4();
    let store = battery_store_builder()
        .add_transactional_event_handler(RefuseFirstInstall {
            battery_id: new,
            refused: Arc::default(),
        })
        .build();
    let service = service_over(store);

    let old = service.register(common::register("SN-G")).await.unwrap();
    let mut request = common::register("SN-H");
    request.battery_id = Some(new);
    service.register(request).await.unwrap();
    service.install(common::install(old, 11, 12.3)).await.unwrap();

    let error = service.replace(common::replace(old, new, 11)).await.unwrap_err();
    match error {
        CommandError::ReplaceIncomplete {
            old_battery_id,
            new_battery_id,
            source,
        } => {
            assert_eq!(old_battery_id, old);
            assert_eq!(new_battery_id, new);
            assert!(matches!(*source, CommandError::Store(StoreError::Custom(_))));
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert_eq!(
        service.battery(old).await.unwrap().unwrap().battery.status,
        BatteryStatus::Removed
    );
    assert_eq!(service.battery(new).await.unwrap().unwrap().battery.status, BatteryStatus::New);
    assert_eq!(service.event_store().version(new).await, 1);

    service.install(common::install(new, 11, 12.7)).await.unwrap();

    let equipment = service.equipment_battery(11).await.unwrap().unwrap();
    assert_eq!(equipment.current_battery_id, Some(new));
    assert_eq!(equipment.current_battery_serial_number.as_deref(), Some("SN-H"));
}
