use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battery::values::{EquipmentId, HealthStatus, MaintenanceType, RemovalReason};

/// Every fact a battery stream can hold.
///
/// Stored as `{"event_type": "...", ...payload}`. Projections and the aggregate match on it
/// exhaustively, so a new kind of fact doesn't compile until every consumer handles it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event_type")]
pub enum BatteryEvent {
    #[serde(rename = "BatteryRegistered")]
    Registered(BatteryRegistered),
    #[serde(rename = "BatteryInstalled")]
    Installed(BatteryInstalled),
    #[serde(rename = "MaintenanceRecorded")]
    MaintenanceRecorded(MaintenanceRecorded),
    #[serde(rename = "BatteryRemoved")]
    Removed(BatteryRemoved),
    #[serde(rename = "BatteryReplaced")]
    Replaced(BatteryReplaced),
    #[serde(rename = "BatteryDisposed")]
    Disposed(BatteryDisposed),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatteryRegistered {
    pub battery_id: Uuid,
    pub serial_number: String,
    pub model: String,
    pub brand: String,
    pub registration_date: DateTime<Utc>,
    pub registered_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatteryInstalled {
    pub battery_id: Uuid,
    pub serial_number: String,
    pub model: String,
    pub equipment_id: EquipmentId,
    pub equipment_code: String,
    pub installation_date: DateTime<Utc>,
    pub initial_voltage: f64,
    pub installed_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MaintenanceRecorded {
    pub battery_id: Uuid,
    pub serial_number: String,
    pub maintenance_id: Uuid,
    pub maintenance_date: DateTime<Utc>,
    pub maintenance_type: MaintenanceType,
    pub voltage_reading: f64,
    pub health_status: HealthStatus,
    pub notes: String,
    pub performed_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatteryRemoved {
    pub battery_id: Uuid,
    pub serial_number: String,
    pub equipment_id: EquipmentId,
    pub removal_date: DateTime<Utc>,
    pub reason: RemovalReason,
    /// Last known voltage, 0 when the battery was never read.
    pub final_voltage: f64,
    pub notes: String,
    pub removed_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatteryReplaced {
    pub old_battery_id: Uuid,
    pub new_battery_id: Uuid,
    pub serial_number: String,
    pub equipment_id: EquipmentId,
    pub replacement_date: DateTime<Utc>,
    pub reason: RemovalReason,
    pub final_voltage: f64,
    pub replaced_by: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatteryDisposed {
    pub battery_id: Uuid,
    pub serial_number: String,
    pub disposal_date: DateTime<Utc>,
    pub disposal_reason: String,
    pub notes: String,
    pub disposed_by: String,
}

impl BatteryEvent {
    /// The battery whose stream holds this fact.
    pub fn battery_id(&self) -> Uuid {
        match self {
            Self::Registered(e) => e.battery_id,
            Self::Installed(e) => e.battery_id,
            Self::MaintenanceRecorded(e) => e.battery_id,
            Self::Removed(e) => e.battery_id,
            Self::Replaced(e) => e.old_battery_id,
            Self::Disposed(e) => e.battery_id,
        }
    }

    pub fn serial_number(&self) -> &str {
        match self {
            Self::Registered(e) => &e.serial_number,
            Self::Installed(e) => &e.serial_number,
            Self::MaintenanceRecorded(e) => &e.serial_number,
            Self::Removed(e) => &e.serial_number,
            Self::Replaced(e) => &e.serial_number,
            Self::Disposed(e) => &e.serial_number,
        }
    }

    /// The business timestamp carried by the fact.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Registered(e) => e.registration_date,
            Self::Installed(e) => e.installation_date,
            Self::MaintenanceRecorded(e) => e.maintenance_date,
            Self::Removed(e) => e.removal_date,
            Self::Replaced(e) => e.replacement_date,
            Self::Disposed(e) => e.disposal_date,
        }
    }

    /// Who performed the action.
    pub fn performed_by(&self) -> &str {
        match self {
            Self::Registered(e) => &e.registered_by,
            Self::Installed(e) => &e.installed_by,
            Self::MaintenanceRecorded(e) => &e.performed_by,
            Self::Removed(e) => &e.removed_by,
            Self::Replaced(e) => &e.replaced_by,
            Self::Disposed(e) => &e.disposed_by,
        }
    }
}

impl crate::Event for BatteryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Registered(_) => "BatteryRegistered",
            Self::Installed(_) => "BatteryInstalled",
            Self::MaintenanceRecorded(_) => "MaintenanceRecorded",
            Self::Removed(_) => "BatteryRemoved",
            Self::Replaced(_) => "BatteryReplaced",
            Self::Disposed(_) => "BatteryDisposed",
        }
    }
}
