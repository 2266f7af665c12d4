use uuid::Uuid;

use crate::battery::values::{BatteryStatus, EquipmentId};
use crate::projection::ProjectionError;
use crate::store::{ConcurrencyConflict, StoreError};

/// A command was rejected by the battery lifecycle rules. Nothing has been appended.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BatteryError {
    #[error("{field} is required")]
    Blank { field: &'static str },
    #[error("battery {0} is already registered")]
    AlreadyRegistered(Uuid),
    #[error("battery is not registered")]
    NotRegistered,
    #[error("a battery with serial number {0} already exists")]
    DuplicateSerial(String),
    #[error("unknown brand `{0}`")]
    UnknownBrand(String),
    #[error("cannot {command} a battery in status {status}, it must be {expected}")]
    InvalidTransition {
        command: &'static str,
        status: BatteryStatus,
        expected: BatteryStatus,
    },
    #[error("voltage {voltage}V is outside [{min}V, {max}V]")]
    VoltageOutOfRange { voltage: f64, min: f64, max: f64 },
    #[error("{field} `{provided}` does not match the registered `{registered}`")]
    SerialMismatch {
        field: &'static str,
        registered: String,
        provided: String,
    },
    #[error("battery is installed on equipment {installed_on}, not {requested}")]
    EquipmentMismatch {
        installed_on: EquipmentId,
        requested: EquipmentId,
    },
    #[error("battery {0} cannot replace itself")]
    SelfReplacement(Uuid),
}

/// Outcome of a rejected or failed command, as seen by callers.
#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] BatteryError),
    #[error("battery {0} not found")]
    NotFound(Uuid),
    #[error("no battery with serial number {0}")]
    UnknownSerial(String),
    #[error(transparent)]
    Conflict(ConcurrencyConflict),
    /// The old battery of a replacement has been removed but the new one could not be installed.
    /// Retrying the install of `new_battery_id` completes the replacement.
    #[error("battery {old_battery_id} was removed but {new_battery_id} could not be installed: {source}")]
    ReplaceIncomplete {
        old_battery_id: Uuid,
        new_battery_id: Uuid,
        #[source]
        source: Box<CommandError>,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl CommandError {
    /// Only stale reads are worth retrying after a reload.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::UnknownSerial(_))
    }
}

impl From<StoreError> for CommandError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(conflict) => Self::Conflict(conflict),
            StoreError::Projection(ProjectionError::UniqueViolation { index, value, .. })
                if index == crate::battery::projections::SERIAL_NUMBER_INDEX =>
            {
                Self::Validation(BatteryError::DuplicateSerial(value))
            }
            other => Self::Store(other),
        }
    }
}
