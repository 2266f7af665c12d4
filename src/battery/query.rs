use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::battery::brand::Brand;
use crate::battery::projections::{AuditEntryView, BatteryStatusView, EquipmentBatteryView, MaintenanceRecordView};
use crate::battery::values::{BatteryStatus, EquipmentId};
use crate::store::StoreError;

/// Read access to the battery projections of a backend.
#[async_trait]
pub trait BatteryQueries: Send + Sync {
    async fn battery_status(&self, battery_id: Uuid) -> Result<Option<BatteryStatusView>, StoreError>;

    /// Every battery, optionally restricted to one status, ordered by serial number.
    async fn batteries_by_status(&self, status: Option<BatteryStatus>) -> Result<Vec<BatteryStatusView>, StoreError>;

    async fn battery_by_serial(&self, serial_number: &str) -> Result<Option<BatteryStatusView>, StoreError>;

    /// Maintenance records of a battery, newest first.
    async fn maintenance_history(&self, battery_id: Uuid) -> Result<Vec<MaintenanceRecordView>, StoreError>;

    async fn equipment_battery(&self, equipment_id: EquipmentId) -> Result<Option<EquipmentBatteryView>, StoreError>;

    async fn audit_log(&self, filter: &AuditFilter) -> Result<AuditPage, StoreError>;

    async fn projection_counts(&self) -> Result<ProjectionCounts, StoreError>;
}

/// A status row enriched with its brand reference data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatteryDetails {
    pub battery: BatteryStatusView,
    pub brand: Brand,
}

/// Row counts of every projection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectionCounts {
    pub batteries: usize,
    pub maintenance_records: usize,
    pub equipment: usize,
    pub audit_entries: usize,
}

/// Filters of the audit log. Text filters are case-insensitive substring matches, the time range
/// is inclusive and applies to the business timestamp of the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub performed_by: Option<String>,
    pub serial_number: Option<String>,
    /// Exact event type, e.g. `"BatteryInstalled"`.
    pub event_type: Option<String>,
    /// Starts at 1.
    pub page: u32,
    pub page_size: u32,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            performed_by: None,
            serial_number: None,
            event_type: None,
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl AuditFilter {
    pub const DEFAULT_PAGE_SIZE: u32 = 50;

    pub fn matches(&self, entry: &AuditEntryView) -> bool {
        self.from.map_or(true, |from| entry.event_timestamp >= from)
            && self.to.map_or(true, |to| entry.event_timestamp <= to)
            && self
                .performed_by
                .as_deref()
                .map_or(true, |needle| contains_ignore_case(&entry.performed_by, needle))
            && self
                .serial_number
                .as_deref()
                .map_or(true, |needle| contains_ignore_case(&entry.serial_number, needle))
            && self
                .event_type
                .as_deref()
                .map_or(true, |event_type| entry.event_type == event_type)
    }

    pub fn page_number(&self) -> u32 {
        self.page.max(1)
    }

    pub fn limit(&self) -> u32 {
        if self.page_size == 0 {
            Self::DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page_number() - 1) * u64::from(self.limit())
    }

    /// Builds the requested page out of the matching entries, which must already be sorted.
    pub fn paginate(&self, matching: Vec<AuditEntryView>) -> AuditPage {
        let total_count = matching.len();
        let entries = matching
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.limit() as usize)
            .collect();

        self.page_of(entries, total_count)
    }

    pub(crate) fn page_of(&self, entries: Vec<AuditEntryView>, total_count: usize) -> AuditPage {
        let page_size = self.limit();
        AuditPage {
            entries,
            total_count,
            page: self.page_number(),
            page_size,
            total_pages: total_count.div_ceil(page_size as usize) as u32,
        }
    }
}

/// A page of the audit log, newest facts first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditPage {
    pub entries: Vec<AuditEntryView>,
    pub total_count: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}
