use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use battery_es::battery::{
    AuditFilter, BatteryError, BatteryEvent, BatteryRegistered, BatteryState, BatteryStatus, CommandError,
    HealthStatus, RemovalReason,
};
use battery_es::projection::ProjectionError;
use battery_es::rebuilder::Rebuilder;
use battery_es::store::{EventStore, StoreError};
use battery_es::AggregateState;

use crate::common;
use crate::postgres::{service, PgService};

async fn table_rows(pool: &Pool<Postgres>, table: &str) -> Vec<(String, serde_json::Value)> {
    sqlx::query_as(&format!("SELECT id, view FROM {table} ORDER BY id"))
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn snapshot(pool: &Pool<Postgres>) -> Vec<Vec<(String, serde_json::Value)>> {
    let mut tables = vec![];
    for table in ["battery_status", "maintenance_history", "equipment_battery", "audit_log"] {
        tables.push(table_rows(pool, table).await);
    }
    tables
}

async fn run_scenario(service: &PgService) {
    let first = service.register(common::register("SN-Q1")).await.unwrap();
    let second = service.register(common::register("SN-Q2")).await.unwrap();

    service.install(common::install(first, 7, 12.6)).await.unwrap();
    service
        .record_maintenance(common::maintenance(first, 12.4, HealthStatus::Good))
        .await
        .unwrap();
    service.replace(common::replace(first, second, 7)).await.unwrap();
    service.dispose(common::dispose(first)).await.unwrap();
}

#[sqlx::test]
async fn lifecycle_is_visible_through_queries_test(pool: Pool<Postgres>) {
    let service = service(&pool).await;
    run_scenario(&service).await;

    let rows = service.batteries(None).await.unwrap();
    assert_eq!(
        rows.iter().map(|row| row.battery.serial_number.as_str()).collect::<Vec<_>>(),
        vec!["SN-Q1", "SN-Q2"]
    );
    assert_eq!(rows[0].battery.status, BatteryStatus::Disposed);
    assert_eq!(rows[1].battery.status, BatteryStatus::Installed);

    let installed = service.batteries(Some(BatteryStatus::Installed)).await.unwrap();
    assert_eq!(installed.len(), 1);

    let second = service.battery_by_serial("SN-Q2").await.unwrap().unwrap();
    assert_eq!(second.current_equipment_id, Some(7));

    let equipment = service.equipment_battery(7).await.unwrap().unwrap();
    assert_eq!(equipment.current_battery_id, Some(second.id));
    assert_eq!(equipment.history.len(), 2);
    assert_eq!(equipment.history[0].removal_reason, Some(RemovalReason::Defective));

    let first = rows[0].battery.id;
    assert_eq!(service.maintenance_history(first).await.unwrap().len(), 1);

    let page = service.audit_log(&AuditFilter::default()).await.unwrap();
    assert_eq!(page.total_count, 7);
    assert_eq!(page.entries[0].event_type, "BatteryDisposed");
    assert_eq!(page.entries[6].event_type, "BatteryRegistered");

    let page = service
        .audit_log(&AuditFilter {
            serial_number: Some("q2".to_string()),
            page_size: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].event_type, "BatteryInstalled");

    let counts = service.projection_counts().await.unwrap();
    assert_eq!(counts.batteries, 2);
    assert_eq!(counts.maintenance_records, 1);
    assert_eq!(counts.equipment, 1);
    assert_eq!(counts.audit_entries, 7);
}

#[sqlx::test]
async fn duplicate_serial_is_a_validation_error_test(pool: Pool<Postgres>) {
    let service = service(&pool).await;

    service.register(common::register("SN-Q3")).await.unwrap();
    let error = service.register(common::register("SN-Q3")).await.unwrap_err();

    assert!(matches!(
        error,
        CommandError::Validation(BatteryError::DuplicateSerial(_))
    ));
}

#[sqlx::test]
async fn rebuild_swaps_in_identical_tables_test(pool: Pool<Postgres>) {
    let service = service(&pool).await;
    run_scenario(&service).await;

    let live = snapshot(&pool).await;

    let (report, counts) = service.rebuild_projections().await.unwrap();
    assert_eq!(report.replayed, 7);
    assert_eq!(report.caught_up, 0);
    assert_eq!(counts.audit_entries, 7);
    assert_eq!(snapshot(&pool).await, live);

    service.event_store().rebuild().await.unwrap();
    assert_eq!(snapshot(&pool).await, live);

    // Constraints came along with the swapped tables.
    let battery_id = Uuid::new_v4();
    let mut state: AggregateState<BatteryState> = AggregateState::with_id(battery_id);
    let error = service
        .event_store()
        .persist(
            &mut state,
            vec![BatteryEvent::Registered(BatteryRegistered {
                battery_id,
                serial_number: "SN-Q1".to_string(),
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

    let leftover: Option<String> =
        sqlx::query_scalar("SELECT schema_name::text FROM information_schema.schemata WHERE schema_name = $1")
            .bind("battery_events_rebuild")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert!(leftover.is_none());
}
