use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::battery::command::BatteryCommand;
use crate::battery::error::BatteryError;
use crate::battery::event::{
    BatteryDisposed, BatteryEvent, BatteryInstalled, BatteryRegistered, BatteryRemoved, BatteryReplaced,
    MaintenanceRecorded,
};
use crate::battery::values::{is_blank, BatteryStatus, EquipmentId, HealthStatus, INSTALL_VOLTAGE, READING_VOLTAGE};
use crate::Aggregate;

/// The battery lifecycle: `New -> Installed -> Removed -> Disposed`.
pub struct Battery;

/// A battery as derived from its stream. `status` is `None` until the battery is registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryState {
    pub id: Uuid,
    pub serial_number: String,
    pub model: String,
    pub brand: String,
    pub registration_date: Option<DateTime<Utc>>,
    pub status: Option<BatteryStatus>,
    pub current_equipment_id: Option<EquipmentId>,
    pub installation_date: Option<DateTime<Utc>>,
    pub last_voltage_reading: Option<f64>,
    pub current_health_status: Option<HealthStatus>,
    pub maintenance_history: Vec<Uuid>,
}

impl BatteryState {
    pub fn is_registered(&self) -> bool {
        self.status.is_some()
    }

    fn require(&self, command: &'static str, expected: BatteryStatus) -> Result<(), BatteryError> {
        match self.status {
            None => Err(BatteryError::NotRegistered),
            Some(status) if status == expected => Ok(()),
            Some(status) => Err(BatteryError::InvalidTransition {
                command,
                status,
                expected,
            }),
        }
    }

    fn installed_on(&self, command: &'static str) -> Result<EquipmentId, BatteryError> {
        self.current_equipment_id.ok_or(BatteryError::InvalidTransition {
            command,
            status: BatteryStatus::Removed,
            expected: BatteryStatus::Installed,
        })
    }
}

fn required(field: &'static str, value: &str) -> Result<(), BatteryError> {
    if is_blank(value) {
        Err(BatteryError::Blank { field })
    } else {
        Ok(())
    }
}

fn voltage_within(voltage: f64, range: &std::ops::RangeInclusive<f64>) -> Result<(), BatteryError> {
    if range.contains(&voltage) {
        Ok(())
    } else {
        Err(BatteryError::VoltageOutOfRange {
            voltage,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

fn matches_registered(field: &'static str, registered: &str, provided: &str) -> Result<(), BatteryError> {
    if is_blank(provided) || provided.trim() == registered {
        Ok(())
    } else {
        Err(BatteryError::SerialMismatch {
            field,
            registered: registered.to_string(),
            provided: provided.to_string(),
        })
    }
}

impl Aggregate for Battery {
    const NAME: &'static str = "battery";
    type State = BatteryState;
    type Command = BatteryCommand;
    type Event = BatteryEvent;
    type Error = BatteryError;

    fn handle_command(state: &Self::State, command: Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let event = match command {
            BatteryCommand::Register {
                battery_id,
                serial_number,
                model,
                brand,
                registration_date,
                registered_by,
            } => {
                if state.is_registered() {
                    return Err(BatteryError::AlreadyRegistered(state.id));
                }
                required("serial_number", &serial_number)?;
                required("model", &model)?;
                required("brand", &brand)?;
                required("registered_by", &registered_by)?;

                BatteryEvent::Registered(BatteryRegistered {
                    battery_id,
                    serial_number: serial_number.trim().to_string(),
                    model: model.trim().to_string(),
                    brand: brand.trim().to_string(),
                    registration_date,
                    registered_by: registered_by.trim().to_string(),
                })
            }
            BatteryCommand::Install {
                serial_number,
                model,
                equipment_id,
                equipment_code,
                initial_voltage,
                installed_by,
                installed_at,
            } => {
                state.require("Install", BatteryStatus::New)?;
                voltage_within(initial_voltage, &INSTALL_VOLTAGE)?;
                required("installed_by", &installed_by)?;
                matches_registered("serial_number", &state.serial_number, &serial_number)?;
                matches_registered("model", &state.model, &model)?;

                BatteryEvent::Installed(BatteryInstalled {
                    battery_id: state.id,
                    serial_number: state.serial_number.clone(),
                    model: state.model.clone(),
                    equipment_id,
                    equipment_code,
                    installation_date: installed_at,
                    initial_voltage,
                    installed_by: installed_by.trim().to_string(),
                })
            }
            BatteryCommand::RecordMaintenance {
                maintenance_id,
                maintenance_type,
                voltage_reading,
                health_status,
                notes,
                performed_by,
                recorded_at,
            } => {
                state.require("RecordMaintenance", BatteryStatus::Installed)?;
                voltage_within(voltage_reading, &READING_VOLTAGE)?;
                required("performed_by", &performed_by)?;

                BatteryEvent::MaintenanceRecorded(MaintenanceRecorded {
                    battery_id: state.id,
                    serial_number: state.serial_number.clone(),
                    maintenance_id,
                    maintenance_date: recorded_at,
                    maintenance_type,
                    voltage_reading,
                    health_status,
                    notes,
                    performed_by: performed_by.trim().to_string(),
                })
            }
            BatteryCommand::Remove {
                reason,
                notes,
                removed_by,
                removed_at,
            } => {
                state.require("Remove", BatteryStatus::Installed)?;
                required("removed_by", &removed_by)?;

                BatteryEvent::Removed(BatteryRemoved {
                    battery_id: state.id,
                    serial_number: state.serial_number.clone(),
                    equipment_id: state.installed_on("Remove")?,
                    removal_date: removed_at,
                    reason,
                    final_voltage: state.last_voltage_reading.unwrap_or(0.0),
                    notes,
                    removed_by: removed_by.trim().to_string(),
                })
            }
            BatteryCommand::Replace {
                new_battery_id,
                equipment_id,
                reason,
                replaced_by,
                replaced_at,
            } => {
                state.require("Replace", BatteryStatus::Installed)?;
                required("replaced_by", &replaced_by)?;
                if new_battery_id == state.id {
                    return Err(BatteryError::SelfReplacement(state.id));
                }
                let installed_on = state.installed_on("Replace")?;
                if installed_on != equipment_id {
                    return Err(BatteryError::EquipmentMismatch {
                        installed_on,
                        requested: equipment_id,
                    });
                }

                BatteryEvent::Replaced(BatteryReplaced {
                    old_battery_id: state.id,
                    new_battery_id,
                    serial_number: state.serial_number.clone(),
                    equipment_id,
                    replacement_date: replaced_at,
                    reason,
                    final_voltage: state.last_voltage_reading.unwrap_or(0.0),
                    replaced_by: replaced_by.trim().to_string(),
                })
            }
            BatteryCommand::Dispose {
                disposal_date,
                disposal_reason,
                notes,
                disposed_by,
            } => {
                state.require("Dispose", BatteryStatus::Removed)?;
                required("disposal_reason", &disposal_reason)?;
                required("disposed_by", &disposed_by)?;

                BatteryEvent::Disposed(BatteryDisposed {
                    battery_id: state.id,
                    serial_number: state.serial_number.clone(),
                    disposal_date,
                    disposal_reason,
                    notes,
                    disposed_by: disposed_by.trim().to_string(),
                })
            }
        };

        Ok(vec![event])
    }

    fn apply_event(mut state: Self::State, payload: Self::Event) -> Self::State {
        match payload {
            BatteryEvent::Registered(e) => {
                state.id = e.battery_id;
                state.serial_number = e.serial_number;
                state.model = e.model;
                state.brand = e.brand;
                state.registration_date = Some(e.registration_date);
                state.status = Some(BatteryStatus::New);
            }
            BatteryEvent::Installed(e) => {
                state.current_equipment_id = Some(e.equipment_id);
                state.installation_date = Some(e.installation_date);
                state.last_voltage_reading = Some(e.initial_voltage);
                state.status = Some(BatteryStatus::Installed);
            }
            BatteryEvent::MaintenanceRecorded(e) => {
                state.last_voltage_reading = Some(e.voltage_reading);
                state.current_health_status = Some(e.health_status);
                state.maintenance_history.push(e.maintenance_id);
            }
            BatteryEvent::Removed(BatteryRemoved { final_voltage, .. })
            | BatteryEvent::Replaced(BatteryReplaced { final_voltage, .. }) => {
                state.current_equipment_id = None;
                state.last_voltage_reading = Some(final_voltage);
                state.status = Some(BatteryStatus::Removed);
            }
            BatteryEvent::Disposed(_) => {
                state.status = Some(BatteryStatus::Disposed);
            }
        }

        state
    }
}
