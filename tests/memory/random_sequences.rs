use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use battery_es::battery::memory::battery_store_builder;
use battery_es::battery::{AuditFilter, HealthStatus, RemovalReason};
use battery_es::rebuilder::Rebuilder;

use crate::common;
use crate::memory::{service_over, MemoryService};

const HEALTH: [HealthStatus; 5] = [
    HealthStatus::Excellent,
    HealthStatus::Good,
    HealthStatus::Fair,
    HealthStatus::Poor,
    HealthStatus::Critical,
];

const REASONS: [RemovalReason; 4] = [
    RemovalReason::EndOfLife,
    RemovalReason::Defective,
    RemovalReason::Upgrade,
    RemovalReason::VehicleSold,
];

/// Fires random, often invalid, commands. Rejected ones are simply dropped.
async fn random_history(service: &MemoryService, rng: &mut StdRng, steps: usize) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = vec![];

    for _ in 0..steps {
        let action = rng.gen_range(0..7);
        if action == 0 || ids.is_empty() {
            let serial = format!("SN-{}", rng.gen_range(0..12));
            if let Ok(id) = service.register(common::register(&serial)).await {
                ids.push(id);
            }
            continue;
        }

        let battery_id = ids[rng.gen_range(0..ids.len())];
        match action {
            1 => {
                let request = common::install(battery_id, rng.gen_range(1..=4), rng.gen_range(9.0..16.0));
                let _ = service.install(request).await;
            }
            2 | 6 => {
                let health = HEALTH[rng.gen_range(0..HEALTH.len())];
                let request = common::maintenance(battery_id, rng.gen_range(-1.0..21.0), health);
                let _ = service.record_maintenance(request).await;
            }
            3 => {
                let reason = REASONS[rng.gen_range(0..REASONS.len())];
                let _ = service.remove(common::remove(battery_id, reason)).await;
            }
            4 => {
                let new_battery_id = ids[rng.gen_range(0..ids.len())];
                let equipment_id = match service.battery_state(battery_id).await.unwrap() {
                    Some(state) => state.current_equipment_id.unwrap_or(1),
                    None => 1,
                };
                let _ = service
                    .replace(common::replace(battery_id, new_battery_id, equipment_id))
                    .await;
            }
            _ => {
                let _ = service.dispose(common::dispose(battery_id)).await;
            }
        }
    }

    ids
}

#[tokio::test]
async fn projections_agree_with_the_streams_for_random_histories() {
    for seed in [7, 42, 1234] {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = battery_store_builder().build();
        let service = service_over(store.clone());

        let ids = random_history(&service, &mut rng, 300).await;

        for battery_id in ids {
            let state = service.battery_state(battery_id).await.unwrap().unwrap();
            let row = service.battery(battery_id).await.unwrap().unwrap().battery;

            assert_eq!(Some(row.status), state.status, "seed {seed}");
            assert_eq!(row.current_equipment_id, state.current_equipment_id, "seed {seed}");
            assert_eq!(row.last_voltage_reading, state.last_voltage_reading, "seed {seed}");
            assert_eq!(row.maintenance_count as usize, state.maintenance_history.len(), "seed {seed}");

            let history = service.maintenance_history(battery_id).await.unwrap();
            assert_eq!(history.len(), state.maintenance_history.len(), "seed {seed}");
            assert!(history
                .windows(2)
                .all(|pair| pair[0].maintenance_date >= pair[1].maintenance_date));
        }

        let audit = service
            .audit_log(&AuditFilter {
                page_size: 1_000,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(audit.total_count as i64, store.last_position().await, "seed {seed}");
        assert!(audit
            .entries
            .windows(2)
            .all(|pair| pair[0].global_position > pair[1].global_position));
    }
}

#[tokio::test]
async fn rebuild_matches_incremental_projections_for_random_histories() {
    for seed in [3, 99, 2024] {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = battery_store_builder().build();
        let service = service_over(store.clone());

        random_history(&service, &mut rng, 300).await;

        let live = store.tables().await;
        let report = store.rebuild().await.unwrap();

        assert_eq!(report.replayed as i64, store.last_position().await, "seed {seed}");
        assert_eq!(*store.tables().await, *live, "seed {seed}");
    }
}
