use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battery::aggregate::Battery;
use crate::battery::event::BatteryEvent;
use crate::battery::values::{EquipmentId, HealthStatus, MaintenanceType, RemovalReason};
use crate::projection::{Projection, ProjectionError};
use crate::store::StoreEvent;
use crate::types::GlobalPosition;

/// One row per fact of any battery, in a uniform shape.
///
/// The row id is the fact id, so that rebuilding the log gives back the very same rows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditEntryView {
    pub id: Uuid,
    pub global_position: GlobalPosition,
    pub battery_id: Uuid,
    pub serial_number: String,
    pub event_type: String,
    pub event_timestamp: DateTime<Utc>,
    pub performed_by: String,
    pub equipment_code: Option<String>,
    pub equipment_id: Option<EquipmentId>,
    pub voltage_reading: Option<f64>,
    pub health_status: Option<HealthStatus>,
    pub maintenance_type: Option<MaintenanceType>,
    pub removal_reason: Option<RemovalReason>,
    pub disposal_reason: Option<String>,
    pub notes: Option<String>,
    pub model: Option<String>,
    pub brand: Option<String>,
    pub description: String,
}

pub struct AuditProjection;

impl Projection<Battery> for AuditProjection {
    type Key = Uuid;
    type View = AuditEntryView;

    fn name(&self) -> &'static str {
        "audit_log"
    }

    fn route(&self, event: &StoreEvent<BatteryEvent>) -> Option<Uuid> {
        Some(event.id)
    }

    fn apply(&self, current: Option<AuditEntryView>, event: &StoreEvent<BatteryEvent>) -> Result<AuditEntryView, ProjectionError> {
        if current.is_some() {
            return Err(ProjectionError::DuplicateRow {
                projection: self.name(),
                key: event.id.to_string(),
                event_type: event.event_type(),
            });
        }

        let mut entry = AuditEntryView {
            id: event.id,
            global_position: event.global_position,
            battery_id: event.aggregate_id,
            serial_number: event.payload.serial_number().to_string(),
            event_type: event.event_type().to_string(),
            event_timestamp: event.payload.occurred_at(),
            performed_by: event.payload.performed_by().to_string(),
            equipment_code: None,
            equipment_id: None,
            voltage_reading: None,
            health_status: None,
            maintenance_type: None,
            removal_reason: None,
            disposal_reason: None,
            notes: None,
            model: None,
            brand: None,
            description: String::new(),
        };

        match &event.payload {
            BatteryEvent::Registered(e) => {
                entry.model = Some(e.model.clone());
                entry.brand = Some(e.brand.clone());
                entry.description = format!("Battery {} registered, model {}", e.serial_number, e.model);
            }
            BatteryEvent::Installed(e) => {
                entry.equipment_code = Some(e.equipment_code.clone());
                entry.equipment_id = Some(e.equipment_id);
                entry.voltage_reading = Some(e.initial_voltage);
                entry.model = Some(e.model.clone());
                entry.description = format!(
                    "Battery installed on equipment {}, initial voltage {:.2}V",
                    e.equipment_code, e.initial_voltage
                );
            }
            BatteryEvent::MaintenanceRecorded(e) => {
                entry.voltage_reading = Some(e.voltage_reading);
                entry.health_status = Some(e.health_status);
                entry.maintenance_type = Some(e.maintenance_type);
                entry.notes = Some(e.notes.clone());
                entry.description = format!(
                    "Maintenance {}, health {}, voltage {:.2}V",
                    e.maintenance_type, e.health_status, e.voltage_reading
                );
            }
            BatteryEvent::Removed(e) => {
                entry.equipment_id = Some(e.equipment_id);
                entry.voltage_reading = Some(e.final_voltage);
                entry.removal_reason = Some(e.reason);
                entry.notes = Some(e.notes.clone());
                entry.description = format!(
                    "Battery removed, reason {}, final voltage {:.2}V",
                    e.reason, e.final_voltage
                );
            }
            BatteryEvent::Replaced(e) => {
                entry.equipment_id = Some(e.equipment_id);
                entry.voltage_reading = Some(e.final_voltage);
                entry.removal_reason = Some(e.reason);
                entry.description = format!(
                    "Battery replaced by {}, reason {}",
                    e.new_battery_id.simple().to_string().get(..8).unwrap_or_default(),
                    e.reason
                );
            }
            BatteryEvent::Disposed(e) => {
                entry.disposal_reason = Some(e.disposal_reason.clone());
                entry.notes = Some(e.notes.clone());
                entry.description = format!("Battery disposed, reason {}", e.disposal_reason);
            }
        }

        Ok(entry)
    }
}
