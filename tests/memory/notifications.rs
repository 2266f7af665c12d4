use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use battery_es::battery::memory::battery_store_builder;
use battery_es::bus::BroadcastEventBus;
use battery_es::config::NotifierConfig;

use crate::common;
use crate::memory::service_over;

#[tokio::test]
async fn every_committed_fact_is_notified_in_order() {
    let bus = BroadcastEventBus::new(&NotifierConfig::builder().capacity(16).build());
    let mut receiver = bus.subscribe();
    let service = service_over(battery_store_builder().add_event_bus(bus.clone()).build());

    let battery_id = service.register(common::register("SN-N1")).await.unwrap();
    service.install(common::install(battery_id, 4, 12.2)).await.unwrap();

    let registered = receiver.recv().await.unwrap();
    assert_eq!(registered.event_type, "BatteryRegistered");
    assert_eq!(registered.aggregate_id, battery_id);
    assert_eq!(registered.sequence_number, 1);
    assert_eq!(registered.global_position, 1);
    assert_eq!(registered.payload["serial_number"], "SN-N1");

    let installed = receiver.recv().await.unwrap();
    assert_eq!(installed.event_type, "BatteryInstalled");
    assert_eq!(installed.sequence_number, 2);
    assert_eq!(installed.global_position, 2);
    assert_eq!(installed.payload["equipment_id"], 4);

    // Rejected commands commit nothing, hence notify nothing.
    assert!(service.install(common::install(battery_id, 5, 12.2)).await.is_err());
    assert!(matches!(receiver.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn commands_succeed_without_subscribers() {
    let bus = BroadcastEventBus::default();
    let service = service_over(battery_store_builder().add_event_bus(bus.clone()).build());

    assert_eq!(bus.subscriber_count(), 0);
    assert!(service.register(common::register("SN-N2")).await.is_ok());
}

#[tokio::test]
async fn lagging_subscribers_are_told_what_they_missed() {
    let bus = BroadcastEventBus::new(&NotifierConfig::builder().capacity(1).build());
    let mut receiver = bus.subscribe();
    let service = service_over(battery_store_builder().add_event_bus(bus.clone()).build());

    for serial in ["SN-N3", "SN-N4", "SN-N5"] {
        service.register(common::register(serial)).await.unwrap();
    }

    assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(2))));
    let latest = receiver.recv().await.unwrap();
    assert_eq!(latest.global_position, 3);
}
