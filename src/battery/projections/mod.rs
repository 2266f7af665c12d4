//! Read models derived from battery facts.
//!
//! All four are inline projections: they are updated in the transaction appending the facts, so a
//! successful command is immediately visible to every query.

pub use audit::{AuditEntryView, AuditProjection};
pub use equipment::{EquipmentBatteryProjection, EquipmentBatteryView, InstallationEntry};
pub use maintenance::{MaintenanceHistoryProjection, MaintenanceRecordView};
pub use status::{BatteryStatusProjection, BatteryStatusView};

mod audit;
mod equipment;
mod maintenance;
mod status;

pub const STATUS_TABLE: &str = "battery_status";
pub const MAINTENANCE_TABLE: &str = "maintenance_history";
pub const EQUIPMENT_TABLE: &str = "equipment_battery";
pub const AUDIT_TABLE: &str = "audit_log";

/// Unique index on the serial number of the status rows.
pub const SERIAL_NUMBER_INDEX: &str = "serial_number";
