//! Pure derivations over the authoritative snapshots.
//!
//! Everything here is synchronous and allocation-light: the state manager
//! passes its current lists and the functions derive views without touching
//! either store.

use crate::types::{
    Container, Device, DeviceFilter, InventorySummary, LogFilter, UsageLogEntry,
};

pub fn container_by_id<'a>(containers: &'a [Container], id: &str) -> Option<&'a Container> {
    containers.iter().find(|c| c.id == id)
}

pub fn device_by_id<'a>(devices: &'a [Device], id: &str) -> Option<&'a Device> {
    devices.iter().find(|d| d.id == id)
}

/// Conjunctive filter; an unset field matches everything. Search is a
/// case-insensitive substring match against name or notes.
pub fn filter_devices<'a>(devices: &'a [Device], filter: &DeviceFilter) -> Vec<&'a Device> {
    let search = filter.search.as_deref().map(str::to_lowercase);
    devices
        .iter()
        .filter(|device| {
            if let Some(needle) = &search {
                let hit = device.name.to_lowercase().contains(needle)
                    || device.notes.to_lowercase().contains(needle);
                if !hit {
                    return false;
                }
            }
            if let Some(category) = &filter.category {
                if &device.category != category {
                    return false;
                }
            }
            if let Some(location) = &filter.location {
                if &device.location != location {
                    return false;
                }
            }
            if let Some(status) = filter.status {
                if device.status != status {
                    return false;
                }
            }
            if let Some(storage_box) = &filter.storage_box {
                if device.storage_box.as_deref() != Some(storage_box.as_str()) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Dashboard counts by status plus the container total.
pub fn summary(devices: &[Device], containers: &[Container]) -> InventorySummary {
    let mut out = InventorySummary {
        total: devices.len(),
        containers: containers.len(),
        ..Default::default()
    };
    for device in devices {
        match device.status {
            crate::types::DeviceStatus::Working => out.working += 1,
            crate::types::DeviceStatus::NeedsRepair => out.needs_repair += 1,
            crate::types::DeviceStatus::Broken => out.broken += 1,
        }
    }
    out
}

/// Log entries for one device, most recent first. The snapshot is already
/// ordered by `taken_at` descending, so this preserves order.
pub fn history_of_device<'a>(log: &'a [UsageLogEntry], device_id: &str) -> Vec<&'a UsageLogEntry> {
    log.iter().filter(|e| e.device_id == device_id).collect()
}

/// Global history view filter. Search matches the device's *current* name,
/// so a renamed device keeps its old log entries findable under the new name.
pub fn filter_log<'a>(
    log: &'a [UsageLogEntry],
    devices: &[Device],
    filter: &LogFilter,
) -> Vec<&'a UsageLogEntry> {
    let search = filter.search.as_deref().map(str::to_lowercase);
    log.iter()
        .filter(|entry| {
            if let Some(needle) = &search {
                let name = device_by_id(devices, &entry.device_id)
                    .map(|d| d.name.to_lowercase())
                    .unwrap_or_default();
                if !name.contains(needle) {
                    return false;
                }
            }
            if let Some(action) = filter.action {
                if entry.action != action {
                    return false;
                }
            }
            if let Some(location) = &filter.location {
                if &entry.location != location {
                    return false;
                }
            }
            if let Some(device_id) = &filter.device_id {
                if &entry.device_id != device_id {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// The most recent `limit` log entries, for activity feeds.
pub fn recent_log<'a>(log: &'a [UsageLogEntry], limit: usize) -> &'a [UsageLogEntry] {
    &log[..limit.min(log.len())]
}

/// The most recently registered `limit` devices; the snapshot is already
/// ordered by creation time descending.
pub fn recent_devices(devices: &[Device], limit: usize) -> &[Device] {
    &devices[..limit.min(devices.len())]
}

/// Devices whose compartment number no longer fits their container, because
/// an edit shrank the container below it. Edits that orphan a compartment
/// are permitted; this surfaces them for the UI to flag.
pub fn orphaned_compartment_devices<'a>(
    devices: &'a [Device],
    containers: &[Container],
) -> Vec<&'a Device> {
    devices
        .iter()
        .filter(|device| {
            match (device.storage_box.as_deref(), device.compartment_number) {
                (Some(box_id), Some(number)) => container_by_id(containers, box_id)
                    .map_or(true, |c| number < 1 || number > c.compartments),
                _ => false,
            }
        })
        .collect()
}
