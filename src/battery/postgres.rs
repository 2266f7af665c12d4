//! Battery projections on Postgres.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::battery::aggregate::Battery;
use crate::battery::projections::{
    AuditEntryView, AuditProjection, BatteryStatusProjection, BatteryStatusView, EquipmentBatteryProjection,
    EquipmentBatteryView, MaintenanceHistoryProjection, MaintenanceRecordView, AUDIT_TABLE, EQUIPMENT_TABLE,
    MAINTENANCE_TABLE, SERIAL_NUMBER_INDEX, STATUS_TABLE,
};
use crate::battery::query::{AuditFilter, AuditPage, BatteryQueries, ProjectionCounts};
use crate::battery::values::{BatteryStatus, EquipmentId};
use crate::store::postgres::{PgStoreBuilder, PgTable};
use crate::store::StoreError;

/// A store builder with the four battery projections already registered.
pub fn battery_store_builder(pool: Pool<Postgres>) -> PgStoreBuilder<Battery> {
    PgStoreBuilder::new(pool)
        .add_projection(
            BatteryStatusProjection,
            PgTable::<BatteryStatusView>::new(STATUS_TABLE)
                .with_unique(SERIAL_NUMBER_INDEX, "serial_number")
                .with_index("status", "status"),
        )
        .add_projection(
            MaintenanceHistoryProjection,
            PgTable::<MaintenanceRecordView>::new(MAINTENANCE_TABLE).with_index("battery_id", "battery_id"),
        )
        .add_projection(
            EquipmentBatteryProjection,
            PgTable::<EquipmentBatteryView>::new(EQUIPMENT_TABLE),
        )
        .add_projection(
            AuditProjection,
            PgTable::<AuditEntryView>::new(AUDIT_TABLE).with_index("serial_number", "serial_number"),
        )
}

/// [`BatteryQueries`] over the projection tables of a Postgres database.
#[derive(Clone, Debug)]
pub struct PgBatteryQueries {
    pool: Pool<Postgres>,
}

impl PgBatteryQueries {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatteryQueries for PgBatteryQueries {
    async fn battery_status(&self, battery_id: Uuid) -> Result<Option<BatteryStatusView>, StoreError> {
        let row: Option<Json<BatteryStatusView>> = sqlx::query_scalar(include_str!("sql/battery_status.sql"))
            .bind(battery_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|Json(view)| view))
    }

    async fn batteries_by_status(&self, status: Option<BatteryStatus>) -> Result<Vec<BatteryStatusView>, StoreError> {
        let rows: Vec<Json<BatteryStatusView>> = sqlx::query_scalar(include_str!("sql/batteries_by_status.sql"))
            .bind(status.as_ref().map(BatteryStatus::as_str))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|Json(view)| view).collect())
    }

    async fn battery_by_serial(&self, serial_number: &str) -> Result<Option<BatteryStatusView>, StoreError> {
        let row: Option<Json<BatteryStatusView>> = sqlx::query_scalar(include_str!("sql/battery_by_serial.sql"))
            .bind(serial_number.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|Json(view)| view))
    }

    async fn maintenance_history(&self, battery_id: Uuid) -> Result<Vec<MaintenanceRecordView>, StoreError> {
        let rows: Vec<Json<MaintenanceRecordView>> = sqlx::query_scalar(include_str!("sql/maintenance_history.sql"))
            .bind(battery_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|Json(view)| view).collect())
    }

    async fn equipment_battery(&self, equipment_id: EquipmentId) -> Result<Option<EquipmentBatteryView>, StoreError> {
        let row: Option<Json<EquipmentBatteryView>> = sqlx::query_scalar(include_str!("sql/equipment_battery.sql"))
            .bind(equipment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|Json(view)| view))
    }

    async fn audit_log(&self, filter: &AuditFilter) -> Result<AuditPage, StoreError> {
        let total_count: i64 = sqlx::query_scalar(include_str!("sql/audit_log_count.sql"))
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.performed_by.as_deref())
            .bind(filter.serial_number.as_deref())
            .bind(filter.event_type.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let entries: Vec<Json<AuditEntryView>> = sqlx::query_scalar(include_str!("sql/audit_log.sql"))
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.performed_by.as_deref())
            .bind(filter.serial_number.as_deref())
            .bind(filter.event_type.as_deref())
            .bind(i64::from(filter.limit()))
            .bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(filter.page_of(
            entries.into_iter().map(|Json(view)| view).collect(),
            usize::try_from(total_count).unwrap_or_default(),
        ))
    }

    async fn projection_counts(&self) -> Result<ProjectionCounts, StoreError> {
        let (batteries, maintenance_records, equipment, audit_entries): (i64, i64, i64, i64) =
            sqlx::query_as(include_str!("sql/projection_counts.sql"))
                .fetch_one(&self.pool)
                .await?;

        Ok(ProjectionCounts {
            batteries: usize::try_from(batteries).unwrap_or_default(),
            maintenance_records: usize::try_from(maintenance_records).unwrap_or_default(),
            equipment: usize::try_from(equipment).unwrap_or_default(),
            audit_entries: usize::try_from(audit_entries).unwrap_or_default(),
        })
    }
}
