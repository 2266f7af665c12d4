use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::battery::aggregate::{Battery, BatteryState};
use crate::battery::brand::{Brand, BrandCatalog};
use crate::battery::command::{
    BatteryCommand, DisposeBattery, InstallBattery, RecordMaintenance, RegisterBattery, RemoveBattery, ReplaceBattery,
};
use crate::battery::error::{BatteryError, CommandError};
use crate::battery::event::BatteryEvent;
use crate::battery::projections::{BatteryStatusView, EquipmentBatteryView, MaintenanceRecordView};
use crate::battery::query::{AuditFilter, AuditPage, BatteryDetails, BatteryQueries, ProjectionCounts};
use crate::battery::values::{is_blank, BatteryStatus, EquipmentId};
use crate::manager::AggregateManager;
use crate::rebuilder::{RebuildReport, Rebuilder};
use crate::state::AggregateState;
use crate::store::{EventStore, StoreError, StoreEvent};
use crate::Aggregate;

/// Command and query entry point for batteries.
///
/// Every command loads the stream, lets the [`Battery`] aggregate decide and appends the outcome
/// with the version read at load time. Queries read the projections through `Q`.
pub struct BatteryService<S, Q>
where
    S: EventStore<Aggregate = Battery>,
{
    manager: AggregateManager<S>,
    queries: Q,
    brands: Option<Arc<dyn BrandCatalog>>,
}

impl<S, Q> BatteryService<S, Q>
where
    S: EventStore<Aggregate = Battery>,
    Q: BatteryQueries,
{
    pub fn new(event_store: S, queries: Q) -> Self {
        Self {
            manager: AggregateManager::new(event_store),
            queries,
            brands: None,
        }
    }

    /// Validates brands on registration and enriches query results with the catalog.
    pub fn with_brand_catalog(self, catalog: impl BrandCatalog + 'static) -> Self {
        Self {
            brands: Some(Arc::new(catalog)),
            ..self
        }
    }

    pub fn event_store(&self) -> &S {
        self.manager.event_store()
    }

    pub fn queries(&self) -> &Q {
        &self.queries
    }

    async fn load_existing(&self, battery_id: Uuid) -> Result<AggregateState<BatteryState>, CommandError> {
        self.manager
            .load(battery_id)
            .await?
            .ok_or(CommandError::NotFound(battery_id))
    }

    async fn execute(&self, battery_id: Uuid, command: BatteryCommand) -> Result<(), CommandError> {
        let mut state = self.load_existing(battery_id).await?;
        let _ = self.manager.handle_command::<CommandError>(&mut state, command).await?;
        Ok(())
    }

    /// Registers a battery and returns its id.
    #[tracing::instrument(skip_all, fields(serial_number = %request.serial_number), err)]
    pub async fn register(&self, request: RegisterBattery) -> Result<Uuid, CommandError> {
        let battery_id = request.battery_id.unwrap_or_else(Uuid::new_v4);

        if let Some(catalog) = &self.brands {
            if !is_blank(&request.brand) && catalog.brand(&request.brand).is_none() {
                return Err(BatteryError::UnknownBrand(request.brand).into());
            }
        }

        let mut state = self.manager.load_or_default(battery_id).await?;
        if state.inner().is_registered() {
            return Err(BatteryError::AlreadyRegistered(battery_id).into());
        }

        let serial_number = request.serial_number.trim();
        if !serial_number.is_empty() && self.queries.battery_by_serial(serial_number).await?.is_some() {
            return Err(BatteryError::DuplicateSerial(serial_number.to_string()).into());
        }

        let command = BatteryCommand::Register {
            battery_id,
            serial_number: request.serial_number,
            model: request.model,
            brand: request.brand,
            registration_date: request.registration_date,
            registered_by: request.registered_by,
        };
        let _ = self.manager.handle_command::<CommandError>(&mut state, command).await?;

        Ok(battery_id)
    }

    #[tracing::instrument(skip_all, fields(battery_id = %request.battery_id), err)]
    pub async fn install(&self, request: InstallBattery) -> Result<Uuid, CommandError> {
        let command = BatteryCommand::Install {
            serial_number: request.serial_number,
            model: request.model,
            equipment_id: request.equipment_id,
            equipment_code: request.equipment_code,
            initial_voltage: request.initial_voltage,
            installed_by: request.installed_by,
            installed_at: Utc::now(),
        };
        self.execute(request.battery_id, command).await?;

        Ok(request.battery_id)
    }

    /// Records a maintenance and returns the id of the new record.
    #[tracing::instrument(skip_all, fields(battery_id = %request.battery_id), err)]
    pub async fn record_maintenance(&self, request: RecordMaintenance) -> Result<Uuid, CommandError> {
        let maintenance_id = Uuid::new_v4();
        let command = BatteryCommand::RecordMaintenance {
            maintenance_id,
            maintenance_type: request.maintenance_type,
            voltage_reading: request.voltage_reading,
            health_status: request.health_status,
            notes: request.notes,
            performed_by: request.performed_by,
            recorded_at: Utc::now(),
        };
        self.execute(request.battery_id, command).await?;

        Ok(maintenance_id)
    }

    #[tracing::instrument(skip_all, fields(battery_id = %request.battery_id), err)]
    pub async fn remove(&self, request: RemoveBattery) -> Result<(), CommandError> {
        let command = BatteryCommand::Remove {
            reason: request.reason,
            notes: request.notes,
            removed_by: request.removed_by,
            removed_at: Utc::now(),
        };
        self.execute(request.battery_id, command).await
    }

    /// Replaces an installed battery and returns the id of the new one.
    ///
    /// Both streams are decided before anything is appended, so a rejected replacement writes
    /// nothing. The old stream is appended first. If the install on the new stream then fails, the
    /// old battery stays removed and [`CommandError::ReplaceIncomplete`] is returned: installing the
    /// new battery on the equipment completes the replacement.
    #[tracing::instrument(skip_all, fields(old_battery_id = %request.old_battery_id), err)]
    pub async fn replace(&self, request: ReplaceBattery) -> Result<Uuid, CommandError> {
        let mut old = self.load_existing(request.old_battery_id).await?;

        let new_battery_id = match request.new_battery_id {
            Some(new_battery_id) => new_battery_id,
            None => self
                .queries
                .battery_by_serial(request.new_serial_number.trim())
                .await?
                .map(|row| row.id)
                .ok_or_else(|| CommandError::UnknownSerial(request.new_serial_number.clone()))?,
        };
        let mut new = self.load_existing(new_battery_id).await?;

        let now = Utc::now();
        let old_events = Battery::handle_command(
            old.inner(),
            BatteryCommand::Replace {
                new_battery_id,
                equipment_id: request.equipment_id,
                reason: request.reason,
                replaced_by: request.replaced_by.clone(),
                replaced_at: now,
            },
        )?;
        let new_events = Battery::handle_command(
            new.inner(),
            BatteryCommand::Install {
                serial_number: request.new_serial_number,
                model: request.new_model,
                equipment_id: request.equipment_id,
                equipment_code: request.equipment_code,
                initial_voltage: request.initial_voltage,
                installed_by: request.replaced_by,
                installed_at: now,
            },
        )?;

        let _ = self.event_store().persist(&mut old, old_events).await?;

        if let Err(error) = self.event_store().persist(&mut new, new_events).await {
            tracing::error!({
                old_battery_id = %request.old_battery_id,
                new_battery_id = %new_battery_id,
                error = %error,
            }, "battery removed but replacement could not be installed");

            return Err(CommandError::ReplaceIncomplete {
                old_battery_id: request.old_battery_id,
                new_battery_id,
                source: Box::new(error.into()),
            });
        }

        Ok(new_battery_id)
    }

    #[tracing::instrument(skip_all, fields(battery_id = %request.battery_id), err)]
    pub async fn dispose(&self, request: DisposeBattery) -> Result<(), CommandError> {
        let command = BatteryCommand::Dispose {
            disposal_date: request.disposal_date,
            disposal_reason: request.disposal_reason,
            notes: request.notes,
            disposed_by: request.disposed_by,
        };
        self.execute(request.battery_id, command).await
    }

    fn brand_of(&self, reference: &str) -> Brand {
        self.brands
            .as_ref()
            .and_then(|catalog| catalog.brand(reference))
            .unwrap_or_else(|| Brand::uncategorized(reference))
    }

    fn details(&self, battery: BatteryStatusView) -> BatteryDetails {
        BatteryDetails {
            brand: self.brand_of(&battery.brand),
            battery,
        }
    }

    pub async fn battery(&self, battery_id: Uuid) -> Result<Option<BatteryDetails>, StoreError> {
        Ok(self
            .queries
            .battery_status(battery_id)
            .await?
            .map(|battery| self.details(battery)))
    }

    pub async fn batteries(&self, status: Option<BatteryStatus>) -> Result<Vec<BatteryDetails>, StoreError> {
        Ok(self
            .queries
            .batteries_by_status(status)
            .await?
            .into_iter()
            .map(|battery| self.details(battery))
            .collect())
    }

    pub async fn battery_by_serial(&self, serial_number: &str) -> Result<Option<BatteryStatusView>, StoreError> {
        self.queries.battery_by_serial(serial_number.trim()).await
    }

    pub async fn maintenance_history(&self, battery_id: Uuid) -> Result<Vec<MaintenanceRecordView>, StoreError> {
        self.queries.maintenance_history(battery_id).await
    }

    pub async fn equipment_battery(&self, equipment_id: EquipmentId) -> Result<Option<EquipmentBatteryView>, StoreError> {
        self.queries.equipment_battery(equipment_id).await
    }

    /// The raw stream of a battery, for diagnostics.
    pub async fn battery_events(&self, battery_id: Uuid) -> Result<Vec<StoreEvent<BatteryEvent>>, StoreError> {
        self.event_store().by_aggregate_id(battery_id).await
    }

    /// The state obtained by folding the stream of a battery.
    pub async fn battery_state(&self, battery_id: Uuid) -> Result<Option<BatteryState>, StoreError> {
        let events = self.battery_events(battery_id).await?;
        Ok((!events.is_empty()).then(|| Battery::replay(events.into_iter().map(|event| event.payload))))
    }

    pub async fn audit_log(&self, filter: &AuditFilter) -> Result<AuditPage, StoreError> {
        self.queries.audit_log(filter).await
    }

    pub async fn projection_counts(&self) -> Result<ProjectionCounts, StoreError> {
        self.queries.projection_counts().await
    }

    /// Rebuilds every projection from the log and returns the row counts after the swap.
    pub async fn rebuild_projections(&self) -> Result<(RebuildReport, ProjectionCounts), StoreError>
    where
        S: Rebuilder<Battery, Error = StoreError>,
    {
        let report = self.event_store().rebuild().await?;
        Ok((report, self.queries.projection_counts().await?))
    }
}
