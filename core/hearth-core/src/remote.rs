//! SQLite adapter for the household's shared store.
//!
//! The remote store is a SQLite database reachable by every member of the
//! household (the `HEARTH_SYNC_URL` environment variable, `file:` scheme or a
//! plain path). The adapter keeps no connection open: each operation opens,
//! runs, and closes, with WAL and a busy timeout so concurrent members do not
//! trip over each other. Schema is initialized on open; `probe()` then checks
//! that the tables answer a trivial count query.
//!
//! # Change subscriptions
//!
//! A process-global hub keyed by database path notifies subscribers after
//! every committed write, carrying only the changed table. Events are coarse:
//! subscribers are expected to re-fetch the table snapshot. Two adapter
//! handles opened on the same path share a hub channel, which is how multiple
//! household members on one machine (or a test) observe each other's writes.
//! Callbacks run on the writer's thread and must not subscribe or
//! unsubscribe re-entrantly.
//!
//! The adapter never retries; any SQLite error surfaces as
//! [`HearthError::RemoteFailure`] and the caller decides recovery.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, ToSql};

use crate::custody::CustodyFields;
use crate::error::{HearthError, Result};
use crate::types::{
    Container, ContainerPatch, Device, DevicePatch, DeviceStatus, LogAction, UsageLogEntry,
};

// ─────────────────────────────────────────────────────────────────────────────
// Change hub
// ─────────────────────────────────────────────────────────────────────────────

/// Which table a change event refers to. The usage log has no channel: the
/// custody operations reload it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangedTable {
    Containers,
    Devices,
}

type ChangeCallback = Box<dyn Fn(ChangedTable) + Send>;

struct HubEntry {
    id: u64,
    household_id: String,
    callback: ChangeCallback,
}

static HUB: Lazy<Mutex<HashMap<PathBuf, Vec<HubEntry>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by [`SqliteRemote::subscribe`]; dropping it unsubscribes.
pub struct Subscription {
    path: PathBuf,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut hub) = HUB.lock() else { return };
        if let Some(entries) = hub.get_mut(&self.path) {
            entries.retain(|entry| entry.id != self.id);
            if entries.is_empty() {
                hub.remove(&self.path);
            }
        }
    }
}

fn notify(path: &Path, household_id: &str, table: ChangedTable) {
    let Ok(hub) = HUB.lock() else { return };
    if let Some(entries) = hub.get(path) {
        for entry in entries {
            if entry.household_id == household_id {
                (entry.callback)(table);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Adapter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SqliteRemote {
    path: PathBuf,
}

impl SqliteRemote {
    /// Opens the shared store at the given URL and initializes the schema.
    pub fn open(url: &str) -> Result<Self> {
        let path = PathBuf::from(url.strip_prefix("file:").unwrap_or(url));
        let remote = SqliteRemote { path };
        remote.init_schema()?;
        Ok(remote)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Liveness probe: a trivial count query on the containers table.
    pub fn probe(&self) -> bool {
        let ready = self
            .with_connection(|conn| {
                conn.query_row("SELECT COUNT(*) FROM storage_boxes", [], |row| {
                    row.get::<_, i64>(0)
                })
                .map_err(remote_err)
            })
            .is_ok();
        if !ready {
            tracing::warn!(path = %self.path.display(), "Remote store probe failed");
        }
        ready
    }

    pub fn subscribe(
        &self,
        household_id: &str,
        callback: impl Fn(ChangedTable) + Send + 'static,
    ) -> Subscription {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut hub) = HUB.lock() {
            hub.entry(self.path.clone()).or_default().push(HubEntry {
                id,
                household_id: household_id.to_string(),
                callback: Box::new(callback),
            });
        }
        Subscription {
            path: self.path.clone(),
            id,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Containers
    // ─────────────────────────────────────────────────────────────────────

    pub fn list_containers(&self, household_id: &str) -> Result<Vec<Container>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, location, compartments, household_id, created_by, created_at \
                     FROM storage_boxes WHERE household_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(remote_err)?;

            let rows = stmt
                .query_map(params![household_id], |row| {
                    Ok(Container {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        location: row.get(2)?,
                        compartments: row.get::<_, i64>(3)? as u32,
                        household_id: row.get(4)?,
                        created_by: row.get(5)?,
                        created_at: parse_ts(row, 6)?,
                    })
                })
                .map_err(remote_err)?;

            let mut containers = Vec::new();
            for row in rows {
                containers.push(row.map_err(remote_err)?);
            }
            Ok(containers)
        })
    }

    pub fn insert_container(&self, container: &Container) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO storage_boxes \
                    (id, name, location, compartments, household_id, created_by, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    container.id,
                    container.name,
                    container.location,
                    container.compartments as i64,
                    container.household_id,
                    container.created_by,
                    container.created_at.to_rfc3339(),
                ],
            )
            .map_err(remote_err)?;
            Ok(())
        })?;
        notify(&self.path, &container.household_id, ChangedTable::Containers);
        Ok(())
    }

    pub fn update_container(
        &self,
        id: &str,
        household_id: &str,
        patch: &ContainerPatch,
    ) -> Result<()> {
        let mut update = UpdateBuilder::new();
        if let Some(name) = &patch.name {
            update.set("name", Box::new(name.clone()));
        }
        if let Some(location) = &patch.location {
            update.set("location", Box::new(location.clone()));
        }
        if let Some(compartments) = patch.compartments {
            update.set("compartments", Box::new(compartments as i64));
        }
        if update.is_empty() {
            return Ok(());
        }

        self.with_connection(|conn| update.apply(conn, "storage_boxes", id, household_id))?;
        notify(&self.path, household_id, ChangedTable::Containers);
        Ok(())
    }

    /// Deletes a container. `devices.storage_box` declares
    /// `ON DELETE SET NULL`, so the store clears container references on the
    /// referring devices in the same statement; both tables are notified.
    pub fn delete_container(&self, id: &str, household_id: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM storage_boxes WHERE id = ?1 AND household_id = ?2",
                params![id, household_id],
            )
            .map_err(remote_err)?;
            // SET NULL leaves compartment numbers behind; clear the halves
            // together so the pairing invariant holds on the next read.
            conn.execute(
                "UPDATE devices SET compartment_number = NULL \
                 WHERE storage_box IS NULL AND compartment_number IS NOT NULL \
                 AND household_id = ?1",
                params![household_id],
            )
            .map_err(remote_err)?;
            Ok(())
        })?;
        notify(&self.path, household_id, ChangedTable::Containers);
        notify(&self.path, household_id, ChangedTable::Devices);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Devices
    // ─────────────────────────────────────────────────────────────────────

    pub fn list_devices(&self, household_id: &str) -> Result<Vec<Device>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, image, category, location, status, notes, \
                            last_maintenance, storage_box, compartment_number, \
                            household_id, created_by, created_at, current_user_id, current_location \
                     FROM devices WHERE household_id = ?1 \
                     ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(remote_err)?;

            let rows = stmt
                .query_map(params![household_id], |row| {
                    let status_raw: String = row.get(5)?;
                    let last_maintenance: Option<String> = row.get(7)?;
                    Ok(Device {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        image: row
                            .get::<_, Option<String>>(2)?
                            .unwrap_or_else(|| crate::types::PLACEHOLDER_IMAGE.to_string()),
                        category: row.get(3)?,
                        location: row.get(4)?,
                        status: DeviceStatus::from_wire(&status_raw),
                        notes: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                        last_maintenance: last_maintenance.and_then(|raw| raw.parse().ok()),
                        storage_box: row.get(8)?,
                        compartment_number: row
                            .get::<_, Option<i64>>(9)?
                            .map(|value| value as u32),
                        household_id: row.get(10)?,
                        created_by: row.get(11)?,
                        created_at: parse_ts(row, 12)?,
                        current_user_id: row.get(13)?,
                        current_location: row
                            .get::<_, Option<String>>(14)?
                            .unwrap_or_else(|| crate::types::HOME_LOCATION.to_string()),
                    })
                })
                .map_err(remote_err)?;

            let mut devices = Vec::new();
            for row in rows {
                devices.push(row.map_err(remote_err)?);
            }
            Ok(devices)
        })
    }

    pub fn insert_device(&self, device: &Device) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO devices \
                    (id, name, image, category, location, status, notes, last_maintenance, \
                     storage_box, compartment_number, household_id, created_by, created_at, \
                     updated_at, current_user_id, current_location) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13, ?14, ?15)",
                params![
                    device.id,
                    device.name,
                    device.image,
                    device.category,
                    device.location,
                    device.status.as_str(),
                    device.notes,
                    device.last_maintenance.map(|d| d.to_string()),
                    device.storage_box,
                    device.compartment_number.map(|n| n as i64),
                    device.household_id,
                    device.created_by,
                    device.created_at.to_rfc3339(),
                    device.current_user_id,
                    device.current_location,
                ],
            )
            .map_err(remote_err)?;
            Ok(())
        })?;
        notify(&self.path, &device.household_id, ChangedTable::Devices);
        Ok(())
    }

    pub fn update_device(&self, id: &str, household_id: &str, patch: &DevicePatch) -> Result<()> {
        let mut update = UpdateBuilder::new();
        if let Some(name) = &patch.name {
            update.set("name", Box::new(name.clone()));
        }
        if let Some(image) = &patch.image {
            update.set("image", Box::new(image.clone()));
        }
        if let Some(category) = &patch.category {
            update.set("category", Box::new(category.clone()));
        }
        if let Some(location) = &patch.location {
            update.set("location", Box::new(location.clone()));
        }
        if let Some(status) = patch.status {
            update.set("status", Box::new(status.as_str()));
        }
        if let Some(notes) = &patch.notes {
            update.set("notes", Box::new(notes.clone()));
        }
        if let Some(last_maintenance) = patch.last_maintenance {
            update.set(
                "last_maintenance",
                Box::new(last_maintenance.map(|d: NaiveDate| d.to_string())),
            );
        }
        if let Some(storage_box) = &patch.storage_box {
            update.set("storage_box", Box::new(storage_box.clone()));
        }
        if let Some(compartment_number) = patch.compartment_number {
            update.set(
                "compartment_number",
                Box::new(compartment_number.map(|n| n as i64)),
            );
        }
        if update.is_empty() {
            return Ok(());
        }

        self.with_connection(|conn| update.apply(conn, "devices", id, household_id))?;
        notify(&self.path, household_id, ChangedTable::Devices);
        Ok(())
    }

    /// Writes the custody pair; used only by the custody transitions.
    pub fn set_custody(&self, id: &str, household_id: &str, fields: &CustodyFields) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE devices SET current_user_id = ?1, current_location = ?2, updated_at = ?3 \
                 WHERE id = ?4 AND household_id = ?5",
                params![
                    fields.current_user_id,
                    fields.current_location,
                    Utc::now().to_rfc3339(),
                    id,
                    household_id,
                ],
            )
            .map_err(remote_err)?;
            Ok(())
        })?;
        notify(&self.path, household_id, ChangedTable::Devices);
        Ok(())
    }

    pub fn delete_device(&self, id: &str, household_id: &str) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM devices WHERE id = ?1 AND household_id = ?2",
                params![id, household_id],
            )
            .map_err(remote_err)?;
            Ok(())
        })?;
        notify(&self.path, household_id, ChangedTable::Devices);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Usage log
    // ─────────────────────────────────────────────────────────────────────

    pub fn list_log(&self, household_id: &str) -> Result<Vec<UsageLogEntry>> {
        self.with_connection(|conn| {
            // rowid breaks taken_at ties, so same-instant entries for one
            // device still have a total order (insertion order)
            let mut stmt = conn
                .prepare(
                    "SELECT id, device_id, user_id, action, location, notes, taken_at, \
                            returned_at, household_id \
                     FROM device_usage_log WHERE household_id = ?1 \
                     ORDER BY taken_at DESC, rowid DESC",
                )
                .map_err(remote_err)?;

            let rows = stmt
                .query_map(params![household_id], |row| {
                    let action_raw: String = row.get(3)?;
                    let action = LogAction::parse(&action_raw).ok_or_else(|| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            format!("unknown log action: {}", action_raw).into(),
                        )
                    })?;
                    let returned_at: Option<String> = row.get(7)?;
                    Ok(UsageLogEntry {
                        id: row.get(0)?,
                        device_id: row.get(1)?,
                        user_id: row.get(2)?,
                        action,
                        location: row.get(4)?,
                        notes: row.get(5)?,
                        taken_at: parse_ts(row, 6)?,
                        returned_at: returned_at.and_then(|raw| {
                            DateTime::parse_from_rfc3339(&raw)
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc))
                        }),
                        household_id: row.get(8)?,
                    })
                })
                .map_err(remote_err)?;

            let mut entries = Vec::new();
            for row in rows {
                entries.push(row.map_err(remote_err)?);
            }
            Ok(entries)
        })
    }

    pub fn insert_log(&self, entry: &UsageLogEntry) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO device_usage_log \
                    (id, device_id, user_id, action, location, notes, taken_at, returned_at, household_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id,
                    entry.device_id,
                    entry.user_id,
                    entry.action.as_str(),
                    entry.location,
                    entry.notes,
                    entry.taken_at.to_rfc3339(),
                    entry.returned_at.map(|ts| ts.to_rfc3339()),
                    entry.household_id,
                ],
            )
            .map_err(remote_err)?;
            Ok(())
        })
    }

    /// Closes the most recent open `taken` row for the device; a silent
    /// no-op when none exists. "Most recent" uses the same taken_at then
    /// rowid order as [`SqliteRemote::list_log`].
    pub fn close_open_taken(&self, device_id: &str, returned_at: DateTime<Utc>) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "UPDATE device_usage_log SET returned_at = ?2 \
                 WHERE id = ( \
                     SELECT id FROM device_usage_log \
                     WHERE device_id = ?1 AND action = 'taken' AND returned_at IS NULL \
                     ORDER BY taken_at DESC, rowid DESC LIMIT 1 \
                 )",
                params![device_id, returned_at.to_rfc3339()],
            )
            .map_err(remote_err)?;
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Connection plumbing
    // ─────────────────────────────────────────────────────────────────────

    fn init_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS storage_boxes (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    location TEXT NOT NULL,
                    compartments INTEGER NOT NULL CHECK (compartments BETWEEN 1 AND 100),
                    household_id TEXT NOT NULL,
                    created_by TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS devices (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    image TEXT,
                    category TEXT NOT NULL,
                    location TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'working',
                    notes TEXT,
                    last_maintenance TEXT,
                    storage_box TEXT REFERENCES storage_boxes(id) ON DELETE SET NULL,
                    compartment_number INTEGER,
                    current_user_id TEXT,
                    current_location TEXT NOT NULL DEFAULT 'home',
                    household_id TEXT NOT NULL,
                    created_by TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS device_usage_log (
                    id TEXT PRIMARY KEY,
                    device_id TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    location TEXT NOT NULL,
                    notes TEXT,
                    taken_at TEXT NOT NULL,
                    returned_at TEXT,
                    household_id TEXT NOT NULL
                 );
                 COMMIT;",
            )
            .map_err(remote_err)?;
            Ok(())
        })
    }

    fn with_connection<T>(&self, op: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.open_connection()?;
        op(&mut conn)
    }

    fn open_connection(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(remote_err)?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags).map_err(remote_err)?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(remote_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(remote_err)?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(remote_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(remote_err)?;

        Ok(conn)
    }
}

fn remote_err(err: impl std::fmt::Display) -> HearthError {
    HearthError::RemoteFailure(err.to_string())
}

fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

struct UpdateBuilder {
    sets: Vec<String>,
    values: Vec<Box<dyn ToSql>>,
}

impl UpdateBuilder {
    fn new() -> Self {
        UpdateBuilder {
            sets: Vec::new(),
            values: Vec::new(),
        }
    }

    fn set(&mut self, column: &str, value: Box<dyn ToSql>) {
        self.values.push(value);
        self.sets.push(format!("{} = ?{}", column, self.values.len()));
    }

    fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn apply(
        mut self,
        conn: &Connection,
        table: &str,
        id: &str,
        household_id: &str,
    ) -> Result<()> {
        self.set("updated_at", Box::new(Utc::now().to_rfc3339()));
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{} AND household_id = ?{}",
            table,
            self.sets.join(", "),
            self.values.len() + 1,
            self.values.len() + 2,
        );
        self.values.push(Box::new(id.to_string()));
        self.values.push(Box::new(household_id.to_string()));
        conn.execute(&sql, params_from_iter(self.values.iter()))
            .map_err(remote_err)?;
        Ok(())
    }
}
