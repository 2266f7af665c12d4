use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battery::aggregate::Battery;
use crate::battery::event::BatteryEvent;
use crate::battery::values::{HealthStatus, MaintenanceType};
use crate::projection::{Projection, ProjectionError};
use crate::store::StoreEvent;

/// One row per maintenance fact. Rows are inserted once and never touched again.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MaintenanceRecordView {
    pub id: Uuid,
    pub battery_id: Uuid,
    pub maintenance_date: DateTime<Utc>,
    pub maintenance_type: MaintenanceType,
    pub voltage_reading: f64,
    pub health_status: HealthStatus,
    pub notes: String,
    pub performed_by: String,
}

pub struct MaintenanceHistoryProjection;

impl Projection<Battery> for MaintenanceHistoryProjection {
    type Key = Uuid;
    type View = MaintenanceRecordView;

    fn name(&self) -> &'static str {
        "maintenance_history"
    }

    fn route(&self, event: &StoreEvent<BatteryEvent>) -> Option<Uuid> {
        match &event.payload {
            BatteryEvent::MaintenanceRecorded(e) => Some(e.maintenance_id),
            BatteryEvent::Registered(_)
            | BatteryEvent::Installed(_)
            | BatteryEvent::Removed(_)
            | BatteryEvent::Replaced(_)
            | BatteryEvent::Disposed(_) => None,
        }
    }

    fn apply(
        &self,
        current: Option<MaintenanceRecordView>,
        event: &StoreEvent<BatteryEvent>,
    ) -> Result<MaintenanceRecordView, ProjectionError> {
        let BatteryEvent::MaintenanceRecorded(e) = &event.payload else {
            return Err(ProjectionError::Unrouted {
                projection: self.name(),
                event_type: event.event_type(),
            });
        };

        if current.is_some() {
            return Err(ProjectionError::DuplicateRow {
                projection: self.name(),
                key: e.maintenance_id.to_string(),
                event_type: event.event_type(),
            });
        }

        Ok(MaintenanceRecordView {
            id: e.maintenance_id,
            battery_id: e.battery_id,
            maintenance_date: e.maintenance_date,
            maintenance_type: e.maintenance_type,
            voltage_reading: e.voltage_reading,
            health_status: e.health_status,
            notes: e.notes.clone(),
            performed_by: e.performed_by.clone(),
        })
    }
}
