//! Battery projections on the in-memory store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::battery::aggregate::Battery;
use crate::battery::projections::{
    AuditEntryView, AuditProjection, BatteryStatusProjection, BatteryStatusView, EquipmentBatteryProjection,
    EquipmentBatteryView, MaintenanceHistoryProjection, MaintenanceRecordView, AUDIT_TABLE, EQUIPMENT_TABLE,
    MAINTENANCE_TABLE, SERIAL_NUMBER_INDEX, STATUS_TABLE,
};
use crate::battery::query::{AuditFilter, AuditPage, BatteryQueries, ProjectionCounts};
use crate::battery::values::{BatteryStatus, EquipmentId};
use crate::projection::InlineProjection;
use crate::store::memory::{InMemoryStore, InMemoryStoreBuilder, MemoryTable};
use crate::store::StoreError;

/// A store builder with the four battery projections already registered.
pub fn battery_store_builder() -> InMemoryStoreBuilder<Battery> {
    InMemoryStoreBuilder::new()
        .add_transactional_event_handler(InlineProjection::new(
            BatteryStatusProjection,
            MemoryTable::<BatteryStatusView>::new(STATUS_TABLE)
                .with_unique(SERIAL_NUMBER_INDEX, |row| row.serial_number.clone()),
        ))
        .add_transactional_event_handler(InlineProjection::new(
            MaintenanceHistoryProjection,
            MemoryTable::<MaintenanceRecordView>::new(MAINTENANCE_TABLE),
        ))
        .add_transactional_event_handler(InlineProjection::new(
            EquipmentBatteryProjection,
            MemoryTable::<EquipmentBatteryView>::new(EQUIPMENT_TABLE),
        ))
        .add_transactional_event_handler(InlineProjection::new(
            AuditProjection,
            MemoryTable::<AuditEntryView>::new(AUDIT_TABLE),
        ))
}

/// [`BatteryQueries`] over the committed tables of an [`InMemoryStore`].
#[derive(Clone, Debug)]
pub struct MemoryBatteryQueries {
    store: InMemoryStore<Battery>,
}

impl MemoryBatteryQueries {
    pub fn new(store: InMemoryStore<Battery>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatteryQueries for MemoryBatteryQueries {
    async fn battery_status(&self, battery_id: Uuid) -> Result<Option<BatteryStatusView>, StoreError> {
        Ok(self.store.tables().await.row(STATUS_TABLE, &battery_id.to_string())?)
    }

    async fn batteries_by_status(&self, status: Option<BatteryStatus>) -> Result<Vec<BatteryStatusView>, StoreError> {
        let mut rows: Vec<BatteryStatusView> = self.store.tables().await.rows(STATUS_TABLE)?;
        rows.retain(|row| status.map_or(true, |status| row.status == status));
        rows.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        Ok(rows)
    }

    async fn battery_by_serial(&self, serial_number: &str) -> Result<Option<BatteryStatusView>, StoreError> {
        let tables = self.store.tables().await;
        match tables.unique_key(STATUS_TABLE, SERIAL_NUMBER_INDEX, serial_number.trim()) {
            Some(key) => Ok(tables.row(STATUS_TABLE, key)?),
            None => Ok(None),
        }
    }

    async fn maintenance_history(&self, battery_id: Uuid) -> Result<Vec<MaintenanceRecordView>, StoreError> {
        let mut rows: Vec<MaintenanceRecordView> = self.store.tables().await.rows(MAINTENANCE_TABLE)?;
        rows.retain(|row| row.battery_id == battery_id);
        rows.sort_by(|a, b| b.maintenance_date.cmp(&a.maintenance_date));
        Ok(rows)
    }

    async fn equipment_battery(&self, equipment_id: EquipmentId) -> Result<Option<EquipmentBatteryView>, StoreError> {
        Ok(self.store.tables().await.row(EQUIPMENT_TABLE, &equipment_id.to_string())?)
    }

    async fn audit_log(&self, filter: &AuditFilter) -> Result<AuditPage, StoreError> {
        let mut rows: Vec<AuditEntryView> = self.store.tables().await.rows(AUDIT_TABLE)?;
        rows.retain(|row| filter.matches(row));
        rows.sort_by(|a, b| b.global_position.cmp(&a.global_position));
        Ok(filter.paginate(rows))
    }

    async fn projection_counts(&self) -> Result<ProjectionCounts, StoreError> {
        let tables = self.store.tables().await;
        Ok(ProjectionCounts {
            batteries: tables.count(STATUS_TABLE),
            maintenance_records: tables.count(MAINTENANCE_TABLE),
            equipment: tables.count(EQUIPMENT_TABLE),
            audit_entries: tables.count(AUDIT_TABLE),
        })
    }
}
