//! Core record types shared by both stores and the state manager.
//!
//! Field names follow the remote schema (`storage_box`, `compartment_number`,
//! `taken_at`, ...) so that a serialized record is wire-compatible with both
//! the SQLite tables and the per-actor JSON snapshots.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Sentinel location meaning "at the household's home base".
pub const HOME_LOCATION: &str = "home";

/// Image reference used when a device has no picture.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg?height=200&width=200";

/// Location presets suggested by UIs. Free-form values are also accepted.
pub const LOCATION_PRESETS: [&str; 8] = [
    "office",
    "garage",
    "workshop",
    "kitchen",
    "bedroom",
    "living-room",
    "basement",
    "other",
];

/// Upper bound on compartments per container.
pub const MAX_COMPARTMENTS: u32 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Operational status of a device.
///
/// The wire representation is the original strings (`working`,
/// `needs-repair`, `broken`). Anything else found in stored data is a data
/// error and is coerced to `Working` on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceStatus {
    #[default]
    Working,
    NeedsRepair,
    Broken,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Working => "working",
            DeviceStatus::NeedsRepair => "needs-repair",
            DeviceStatus::Broken => "broken",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "working" => Some(DeviceStatus::Working),
            "needs-repair" => Some(DeviceStatus::NeedsRepair),
            "broken" => Some(DeviceStatus::Broken),
            _ => None,
        }
    }

    /// Lenient read used on every load path: unknown values coerce to
    /// `Working` and the event is logged.
    pub fn from_wire(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            tracing::warn!(status = raw, "Unknown device status, coercing to working");
            DeviceStatus::Working
        })
    }
}

fn de_status_lenient<'de, D>(deserializer: D) -> Result<DeviceStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(DeviceStatus::from_wire(&raw))
}

/// Custody transition recorded in the usage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Taken,
    Returned,
    Moved,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Taken => "taken",
            LogAction::Returned => "returned",
            LogAction::Moved => "moved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "taken" => Some(LogAction::Taken),
            "returned" => Some(LogAction::Returned),
            "moved" => Some(LogAction::Moved),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A physical storage box subdivided into a fixed number of compartments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub location: String,
    pub compartments: u32,
    pub household_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A tracked physical item.
///
/// `location` is the free-text home location ("where it lives");
/// `current_location` is the custody location ("where it is right now"),
/// defaulting to the [`HOME_LOCATION`] sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default = "placeholder_image")]
    pub image: String,
    pub category: String,
    pub location: String,
    #[serde(default, deserialize_with = "de_status_lenient")]
    pub status: DeviceStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub last_maintenance: Option<NaiveDate>,
    #[serde(default)]
    pub storage_box: Option<String>,
    #[serde(default)]
    pub compartment_number: Option<u32>,
    pub household_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub current_user_id: Option<String>,
    #[serde(default = "home_location")]
    pub current_location: String,
}

fn placeholder_image() -> String {
    PLACEHOLDER_IMAGE.to_string()
}

fn home_location() -> String {
    HOME_LOCATION.to_string()
}

/// Append-only record of a custody transition.
///
/// `returned_at` is only meaningful for `taken` rows; a `taken` row with
/// `returned_at = None` is the device's open custody record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub id: String,
    pub device_id: String,
    pub user_id: String,
    pub action: LogAction,
    pub location: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub returned_at: Option<DateTime<Utc>>,
    pub household_id: String,
}

impl UsageLogEntry {
    /// True for a `taken` row that has not been closed by a return.
    pub fn is_open_taken(&self) -> bool {
        self.action == LogAction::Taken && self.returned_at.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs and patches
// ─────────────────────────────────────────────────────────────────────────────

/// Input for creating a container. Identity and timestamps are filled in by
/// the state manager.
#[derive(Debug, Clone, Default)]
pub struct NewContainer {
    pub name: String,
    pub location: String,
    pub compartments: u32,
}

/// Input for creating a device.
#[derive(Debug, Clone, Default)]
pub struct NewDevice {
    pub name: String,
    pub image: Option<String>,
    pub category: String,
    pub location: String,
    pub status: DeviceStatus,
    pub notes: String,
    pub last_maintenance: Option<NaiveDate>,
    pub storage_box: Option<String>,
    pub compartment_number: Option<u32>,
}

/// Partial update for a container. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ContainerPatch {
    pub name: Option<String>,
    pub location: Option<String>,
    pub compartments: Option<u32>,
}

impl ContainerPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.location.is_none() && self.compartments.is_none()
    }
}

/// Partial update for a device.
///
/// Nullable columns use `Option<Option<T>>`: the outer `None` means "leave
/// untouched", `Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: Option<DeviceStatus>,
    pub notes: Option<String>,
    pub last_maintenance: Option<Option<NaiveDate>>,
    pub storage_box: Option<Option<String>>,
    pub compartment_number: Option<Option<u32>>,
}

impl Container {
    pub fn apply(&mut self, patch: &ContainerPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(location) = &patch.location {
            self.location = location.clone();
        }
        if let Some(compartments) = patch.compartments {
            self.compartments = compartments;
        }
    }
}

impl Device {
    pub fn apply(&mut self, patch: &DevicePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(image) = &patch.image {
            self.image = image.clone();
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(location) = &patch.location {
            self.location = location.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(last_maintenance) = patch.last_maintenance {
            self.last_maintenance = last_maintenance;
        }
        if let Some(storage_box) = &patch.storage_box {
            self.storage_box = storage_box.clone();
        }
        if let Some(compartment_number) = patch.compartment_number {
            self.compartment_number = compartment_number;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Query inputs and outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Conjunctive device filter; unset fields mean "any".
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: Option<DeviceStatus>,
    pub storage_box: Option<String>,
}

/// Conjunctive usage-log filter for the global history view.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    /// Substring match against the device's current name.
    pub search: Option<String>,
    pub action: Option<LogAction>,
    pub location: Option<String>,
    pub device_id: Option<String>,
}

/// Dashboard counts derived from the current snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InventorySummary {
    pub total: usize,
    pub working: usize,
    pub needs_repair: usize,
    pub broken: usize,
    pub containers: usize,
}
