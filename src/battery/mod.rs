//! The battery lifecycle domain: the aggregate, its facts, the projections derived from them and
//! the command/query service on top.

pub use aggregate::{Battery, BatteryState};
pub use brand::{Brand, BrandCatalog, StaticBrandCatalog};
pub use command::{
    BatteryCommand, DisposeBattery, InstallBattery, RecordMaintenance, RegisterBattery, RemoveBattery, ReplaceBattery,
};
pub use error::{BatteryError, CommandError};
pub use event::{
    BatteryDisposed, BatteryEvent, BatteryInstalled, BatteryRegistered, BatteryRemoved, BatteryReplaced,
    MaintenanceRecorded,
};
pub use query::{AuditFilter, AuditPage, BatteryDetails, BatteryQueries, ProjectionCounts};
pub use service::BatteryService;
pub use values::{
    BatteryStatus, EquipmentId, HealthStatus, MaintenanceType, RemovalReason, INSTALL_VOLTAGE, READING_VOLTAGE,
};

mod aggregate;
mod brand;
mod command;
mod error;
mod event;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod projections;
mod query;
mod service;
mod values;
