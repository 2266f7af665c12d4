use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battery::aggregate::Battery;
use crate::battery::event::BatteryEvent;
use crate::battery::values::{EquipmentId, RemovalReason};
use crate::projection::{Projection, ProjectionError};
use crate::store::StoreEvent;

/// The battery currently installed on a piece of equipment, plus every past installation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EquipmentBatteryView {
    pub equipment_id: EquipmentId,
    pub equipment_code: String,
    pub current_battery_id: Option<Uuid>,
    /// Unknown between a replacement and the install of the new battery.
    pub current_battery_serial_number: Option<String>,
    pub current_battery_install_date: Option<DateTime<Utc>>,
    pub history: Vec<InstallationEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstallationEntry {
    pub battery_id: Uuid,
    pub serial_number: String,
    pub installed_date: DateTime<Utc>,
    pub removed_date: Option<DateTime<Utc>>,
    pub removal_reason: Option<RemovalReason>,
}

impl EquipmentBatteryView {
    fn close(&mut self, battery_id: Uuid, date: DateTime<Utc>, reason: RemovalReason) {
        if let Some(entry) = self
            .history
            .iter_mut()
            .rev()
            .find(|entry| entry.battery_id == battery_id && entry.removed_date.is_none())
        {
            entry.removed_date = Some(date);
            entry.removal_reason = Some(reason);
        }
    }
}

/// Keyed by equipment id while fed by battery streams: the key is computed from each fact.
pub struct EquipmentBatteryProjection;

impl Projection<Battery> for EquipmentBatteryProjection {
    type Key = EquipmentId;
    type View = EquipmentBatteryView;

    fn name(&self) -> &'static str {
        "equipment_battery"
    }

    fn route(&self, event: &StoreEvent<BatteryEvent>) -> Option<EquipmentId> {
        match &event.payload {
            BatteryEvent::Installed(e) => Some(e.equipment_id),
            BatteryEvent::Removed(e) => Some(e.equipment_id),
            BatteryEvent::Replaced(e) => Some(e.equipment_id),
            BatteryEvent::Registered(_) | BatteryEvent::MaintenanceRecorded(_) | BatteryEvent::Disposed(_) => None,
        }
    }

    fn apply(
        &self,
        current: Option<EquipmentBatteryView>,
        event: &StoreEvent<BatteryEvent>,
    ) -> Result<EquipmentBatteryView, ProjectionError> {
        let missing = |equipment_id: EquipmentId| ProjectionError::MissingRow {
            projection: self.name(),
            key: equipment_id.to_string(),
            event_type: event.event_type(),
        };

        match &event.payload {
            BatteryEvent::Installed(e) => {
                let mut row = current.unwrap_or_else(|| EquipmentBatteryView {
                    equipment_id: e.equipment_id,
                    equipment_code: e.equipment_code.clone(),
                    current_battery_id: None,
                    current_battery_serial_number: None,
                    current_battery_install_date: None,
                    history: vec![],
                });

                row.equipment_code = e.equipment_code.clone();
                row.current_battery_id = Some(e.battery_id);
                row.current_battery_serial_number = Some(e.serial_number.clone());
                row.current_battery_install_date = Some(e.installation_date);
                row.history.push(InstallationEntry {
                    battery_id: e.battery_id,
                    serial_number: e.serial_number.clone(),
                    installed_date: e.installation_date,
                    removed_date: None,
                    removal_reason: None,
                });

                Ok(row)
            }
            BatteryEvent::Replaced(e) => {
                let mut row = current.ok_or_else(|| missing(e.equipment_id))?;

                row.close(e.old_battery_id, e.replacement_date, e.reason);
                row.current_battery_id = Some(e.new_battery_id);
                row.current_battery_serial_number = None;
                row.current_battery_install_date = Some(e.replacement_date);

                Ok(row)
            }
            BatteryEvent::Removed(e) => {
                let mut row = current.ok_or_else(|| missing(e.equipment_id))?;

                row.close(e.battery_id, e.removal_date, e.reason);
                if row.current_battery_id == Some(e.battery_id) {
                    row.current_battery_id = None;
                    row.current_battery_serial_number = None;
                    row.current_battery_install_date = None;
                }

                Ok(row)
            }
            BatteryEvent::Registered(_) | BatteryEvent::MaintenanceRecorded(_) | BatteryEvent::Disposed(_) => {
                Err(ProjectionError::Unrouted {
                    projection: self.name(),
                    event_type: event.event_type(),
                })
            }
        }
    }
}
