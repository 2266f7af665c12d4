use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battery::aggregate::Battery;
use crate::battery::event::BatteryEvent;
use crate::battery::values::{BatteryStatus, EquipmentId, HealthStatus};
use crate::projection::{Projection, ProjectionError};
use crate::store::StoreEvent;

/// Current state of a battery, one row per stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatteryStatusView {
    pub id: Uuid,
    pub serial_number: String,
    pub model: String,
    pub brand: String,
    pub registration_date: DateTime<Utc>,
    pub status: BatteryStatus,
    pub current_equipment_id: Option<EquipmentId>,
    pub equipment_code: Option<String>,
    pub installation_date: Option<DateTime<Utc>>,
    pub last_voltage_reading: Option<f64>,
    pub current_health_status: Option<HealthStatus>,
    pub last_maintenance_date: Option<DateTime<Utc>>,
    pub maintenance_count: u32,
}

pub struct BatteryStatusProjection;

impl Projection<Battery> for BatteryStatusProjection {
    type Key = Uuid;
    type View = BatteryStatusView;

    fn name(&self) -> &'static str {
        "battery_status"
    }

    fn route(&self, event: &StoreEvent<BatteryEvent>) -> Option<Uuid> {
        Some(event.aggregate_id)
    }

    fn apply(&self, current: Option<BatteryStatusView>, event: &StoreEvent<BatteryEvent>) -> Result<BatteryStatusView, ProjectionError> {
        let mut row = match (&event.payload, current) {
            (BatteryEvent::Registered(e), None) => {
                return Ok(BatteryStatusView {
                    id: e.battery_id,
                    serial_number: e.serial_number.clone(),
                    model: e.model.clone(),
                    brand: e.brand.clone(),
                    registration_date: e.registration_date,
                    status: BatteryStatus::New,
                    current_equipment_id: None,
                    equipment_code: None,
                    installation_date: None,
                    last_voltage_reading: None,
                    current_health_status: None,
                    last_maintenance_date: None,
                    maintenance_count: 0,
                })
            }
            (BatteryEvent::Registered(_), Some(_)) => {
                return Err(ProjectionError::DuplicateRow {
                    projection: self.name(),
                    key: event.aggregate_id.to_string(),
                    event_type: event.event_type(),
                })
            }
            (_, None) => {
                return Err(ProjectionError::MissingRow {
                    projection: self.name(),
                    key: event.aggregate_id.to_string(),
                    event_type: event.event_type(),
                })
            }
            (_, Some(row)) => row,
        };

        match &event.payload {
            // Only ever creates the row.
            BatteryEvent::Registered(_) => {}
            BatteryEvent::Installed(e) => {
                row.status = BatteryStatus::Installed;
                row.current_equipment_id = Some(e.equipment_id);
                row.equipment_code = Some(e.equipment_code.clone());
                row.installation_date = Some(e.installation_date);
                row.last_voltage_reading = Some(e.initial_voltage);
            }
            BatteryEvent::MaintenanceRecorded(e) => {
                row.last_voltage_reading = Some(e.voltage_reading);
                row.current_health_status = Some(e.health_status);
                row.last_maintenance_date = Some(e.maintenance_date);
                row.maintenance_count += 1;
            }
            BatteryEvent::Removed(e) => {
                row.status = BatteryStatus::Removed;
                row.current_equipment_id = None;
                row.equipment_code = None;
                row.last_voltage_reading = Some(e.final_voltage);
            }
            BatteryEvent::Replaced(e) => {
                row.status = BatteryStatus::Removed;
                row.current_equipment_id = None;
                row.equipment_code = None;
                row.last_voltage_reading = Some(e.final_voltage);
            }
            BatteryEvent::Disposed(_) => {
                row.status = BatteryStatus::Disposed;
            }
        }

        Ok(row)
    }
}
