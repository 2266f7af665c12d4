use chrono::Utc;
use futures::TryStreamExt;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use battery_es::battery::postgres::battery_store_builder;
use battery_es::battery::{Battery, BatteryEvent, BatteryRegistered, BatteryState};
use battery_es::projection::ProjectionError;
use battery_es::store::postgres::{PgStore, PgStoreBuilder};
use battery_es::store::{EventStore, StoreError, StoreEvent};
use battery_es::{Aggregate, AggregateState};

fn registered(battery_id: Uuid, serial_number: &str) -> BatteryEvent {
    BatteryEvent::Registered(BatteryRegistered {
        battery_id,
        serial_number: serial_number.to_string(),
        model: "AGM-70".to_string(),
        brand: "Varta".to_string(),
        registration_date: Utc::now(),
        registered_by: "Alice Martin".to_string(),
    })
}

async fn index_names(pool: &Pool<Postgres>, table_name: &str) -> Vec<String> {
    let mut names: Vec<String> = sqlx::query_scalar("SELECT indexname::text FROM pg_indexes WHERE tablename = $1")
        .bind(table_name)
        .fetch_all(pool)
        .await
        .unwrap();
    names.sort();
    names
}

#[sqlx::test]
async fn setup_database_test(pool: Pool<Postgres>) {
    let table_name: String = format!("{}_events", Battery::NAME);

    let _: PgStore<Battery> = battery_store_builder(pool.clone())
        .try_build()
        .await
        .expect("Failed to create PgStore");

    assert_eq!(
        index_names(&pool, &table_name).await,
        vec![
            "battery_events_aggregate_id".to_string(),
            "battery_events_aggregate_id_sequence_number".to_string(),
            "battery_events_global_position".to_string(),
            "battery_events_pkey".to_string(),
        ]
    );

    assert!(index_names(&pool, "battery_status")
        .await
        .contains(&"battery_status_serial_number".to_string()));
    assert_eq!(index_names(&pool, "equipment_battery").await, vec!["equipment_battery_pkey".to_string()]);

    // Migrations can run again.
    let _: PgStore<Battery> = battery_store_builder(pool.clone()).try_build().await.unwrap();
}

#[sqlx::test]
async fn persist_assigns_sequence_numbers_and_positions_test(pool: Pool<Postgres>) {
    let store: PgStore<Battery> = PgStoreBuilder::new(pool.clone()).try_build().await.unwrap();

    let first_id: Uuid = Uuid::new_v4();
    let second_id: Uuid = Uuid::new_v4();

    let mut first: AggregateState<BatteryState> = AggregateState::with_id(first_id);
    let mut second: AggregateState<BatteryState> = AggregateState::with_id(second_id);

    let store_events = store.persist(&mut first, vec![registered(first_id, "SN-P1")]).await.unwrap();
    assert_eq!(store_events[0].sequence_number, 1);
    assert_eq!(*first.sequence_number(), 1);
    assert_eq!(first.inner().serial_number, "SN-P1");

    store.persist(&mut second, vec![registered(second_id, "SN-P2")]).await.unwrap();

    let loaded: Vec<StoreEvent<BatteryEvent>> = store.by_aggregate_id(first_id).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, store_events[0].id);
    assert_eq!(loaded[0].payload, store_events[0].payload);
    assert_eq!(loaded[0].global_position, store_events[0].global_position);

    let all: Vec<StoreEvent<BatteryEvent>> = store.stream_events(0).try_collect().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].global_position < all[1].global_position);
    assert_eq!(all[1].aggregate_id, second_id);

    let after_first: Vec<StoreEvent<BatteryEvent>> =
        store.stream_events(all[0].global_position).try_collect().await.unwrap();
    assert_eq!(after_first.len(), 1);
    assert_eq!(store.last_position().await.unwrap(), all[1].global_position);
}

#[sqlx::test]
async fn stale_version_is_a_conflict_test(pool: Pool<Postgres>) {
    let store: PgStore<Battery> = PgStoreBuilder::new(pool.clone()).try_build().await.unwrap();

    let battery_id: Uuid = Uuid::new_v4();
    let mut state: AggregateState<BatteryState> = AggregateState::with_id(battery_id);
    store.persist(&mut state, vec![registered(battery_id, "SN-P3")]).await.unwrap();

    // Starts again at version zero, as a writer that never saw the stream would.
    let mut stale: AggregateState<BatteryState> = AggregateState::with_id(battery_id);
    let error = store
        .persist(&mut stale, vec![registered(battery_id, "SN-P3")])
        .await
        .unwrap_err();

    let conflict = error.as_conflict().unwrap();
    assert_eq!(conflict.expected, 0);
    assert_eq!(conflict.actual, Some(1));

    assert_eq!(store.by_aggregate_id(battery_id).await.unwrap().len(), 1);
}

#[sqlx::test]
async fn unique_serial_rolls_the_append_back_test(pool: Pool<Postgres>) {
    let store: PgStore<Battery> = battery_store_builder(pool.clone()).try_build().await.unwrap();

    let first_id: Uuid = Uuid::new_v4();
    let mut first: AggregateState<BatteryState> = AggregateState::with_id(first_id);
    store.persist(&mut first, vec![registered(first_id, "SN-P4")]).await.unwrap();

    let second_id: Uuid = Uuid::new_v4();
    let mut second: AggregateState<BatteryState> = AggregateState::with_id(second_id);
    let error = store
        .persist(&mut second, vec![registered(second_id, "SN-P4")])
        .await
        .unwrap_err();

    match error {
        StoreError::Projection(ProjectionError::UniqueViolation { table, index, value }) => {
            assert_eq!(table, "battery_status");
            assert_eq!(index, "serial_number");
            assert_eq!(value, "SN-P4");
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert!(store.by_aggregate_id(second_id).await.unwrap().is_empty());
    let audit_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(audit_rows, 1);
}
