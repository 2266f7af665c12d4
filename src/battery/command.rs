use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::battery::values::{EquipmentId, HealthStatus, MaintenanceType, RemovalReason};

/// Commands decided by the [`crate::battery::Battery`] aggregate.
///
/// They carry everything the aggregate can't produce itself (timestamps, fresh ids), which keeps
/// decisions deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum BatteryCommand {
    Register {
        battery_id: Uuid,
        serial_number: String,
        model: String,
        brand: String,
        registration_date: DateTime<Utc>,
        registered_by: String,
    },
    Install {
        /// Blank to skip the check against the registered serial number.
        serial_number: String,
        /// Blank to skip the check against the registered model.
        model: String,
        equipment_id: EquipmentId,
        equipment_code: String,
        initial_voltage: f64,
        installed_by: String,
        installed_at: DateTime<Utc>,
    },
    RecordMaintenance {
        maintenance_id: Uuid,
        maintenance_type: MaintenanceType,
        voltage_reading: f64,
        health_status: HealthStatus,
        notes: String,
        performed_by: String,
        recorded_at: DateTime<Utc>,
    },
    Remove {
        reason: RemovalReason,
        notes: String,
        removed_by: String,
        removed_at: DateTime<Utc>,
    },
    Replace {
        new_battery_id: Uuid,
        /// The equipment the old battery must currently be installed on.
        equipment_id: EquipmentId,
        reason: RemovalReason,
        replaced_by: String,
        replaced_at: DateTime<Utc>,
    },
    Dispose {
        disposal_date: DateTime<Utc>,
        disposal_reason: String,
        notes: String,
        disposed_by: String,
    },
}

impl BatteryCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "Register",
            Self::Install { .. } => "Install",
            Self::RecordMaintenance { .. } => "RecordMaintenance",
            Self::Remove { .. } => "Remove",
            Self::Replace { .. } => "Replace",
            Self::Dispose { .. } => "Dispose",
        }
    }
}

/// Registers a new battery. A fresh id is generated when `battery_id` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterBattery {
    pub battery_id: Option<Uuid>,
    pub serial_number: String,
    pub model: String,
    pub brand: String,
    pub registration_date: DateTime<Utc>,
    pub registered_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallBattery {
    pub battery_id: Uuid,
    pub serial_number: String,
    pub model: String,
    pub equipment_id: EquipmentId,
    pub equipment_code: String,
    pub initial_voltage: f64,
    pub installed_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordMaintenance {
    pub battery_id: Uuid,
    pub maintenance_type: MaintenanceType,
    pub voltage_reading: f64,
    pub health_status: HealthStatus,
    pub notes: String,
    pub performed_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoveBattery {
    pub battery_id: Uuid,
    pub reason: RemovalReason,
    pub notes: String,
    pub removed_by: String,
}

/// Removes the installed `old_battery_id` and installs another, already registered, battery on
/// `equipment_id`. When `new_battery_id` is `None` the new battery is looked up by
/// `new_serial_number`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceBattery {
    pub old_battery_id: Uuid,
    pub new_battery_id: Option<Uuid>,
    pub new_serial_number: String,
    pub new_model: String,
    pub equipment_id: EquipmentId,
    pub equipment_code: String,
    pub reason: RemovalReason,
    pub initial_voltage: f64,
    pub replaced_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisposeBattery {
    pub battery_id: Uuid,
    pub disposal_date: DateTime<Utc>,
    pub disposal_reason: String,
    pub notes: String,
    pub disposed_by: String,
}
