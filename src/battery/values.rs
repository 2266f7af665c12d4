use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Identifier of a piece of equipment (vehicle) a battery is installed on.
pub type EquipmentId = i64;

/// Voltage accepted when installing a battery.
pub const INSTALL_VOLTAGE: RangeInclusive<f64> = 10.0..=15.0;
/// Voltage accepted for a maintenance reading.
pub const READING_VOLTAGE: RangeInclusive<f64> = 0.0..=20.0;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatteryStatus {
    New,
    Installed,
    Removed,
    Disposed,
}

impl BatteryStatus {
    pub const ALL: [BatteryStatus; 4] = [Self::New, Self::Installed, Self::Removed, Self::Disposed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Installed => "Installed",
            Self::Removed => "Removed",
            Self::Disposed => "Disposed",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaintenanceType {
    Charging,
    Inspection,
    VoltageTest,
    LoadTest,
}

impl MaintenanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Charging => "Charging",
            Self::Inspection => "Inspection",
            Self::VoltageTest => "VoltageTest",
            Self::LoadTest => "LoadTest",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    EndOfLife,
    Defective,
    Upgrade,
    VehicleSold,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndOfLife => "EndOfLife",
            Self::Defective => "Defective",
            Self::Upgrade => "Upgrade",
            Self::VehicleSold => "VehicleSold",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(BatteryStatus, HealthStatus, MaintenanceType, RemovalReason);

/// Whether a required text field is missing.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
