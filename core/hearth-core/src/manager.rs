//! Inventory state manager.
//!
//! Owns the three authoritative snapshots (containers, devices, usage log)
//! and routes every mutation through whichever adapter the mode arbiter
//! selected. Remote CRUD writes are not applied optimistically: the change
//! subscription echoes the committed row set back and [`InventoryManager::pump`]
//! folds it in. Custody transitions are the exception: they eagerly patch the
//! mutated device and reload the log so callers see the transition before the
//! echo arrives.
//!
//! The manager is synchronous and single-owner; it is not `Sync`. Background
//! subscription callbacks only enqueue table names on an internal channel,
//! and `pump()` drains that queue on the owner's thread.

use std::sync::mpsc::{channel, Receiver, Sender};

use chrono::Utc;
use ulid::Ulid;

use crate::config::EnvConfig;
use crate::custody;
use crate::error::{HearthError, Result};
use crate::identity::Identity;
use crate::local::LocalStore;
use crate::mode::{arbitrate, ActiveStore, StoreMode};
use crate::query;
use crate::remote::{ChangedTable, SqliteRemote, Subscription};
use crate::types::{
    Container, ContainerPatch, Device, DeviceFilter, DevicePatch, InventorySummary, LogAction,
    LogFilter, NewContainer, NewDevice, UsageLogEntry, HOME_LOCATION, PLACEHOLDER_IMAGE,
};
use crate::validation;

/// Change notification emitted to registered listeners after the manager's
/// snapshots or mode change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEvent {
    ModeChanged(StoreMode),
    ContainersChanged,
    DevicesChanged,
    LogChanged,
}

type EventListener = Box<dyn FnMut(InventoryEvent)>;

pub struct InventoryManager {
    config: EnvConfig,
    local: LocalStore,
    identity: Option<Identity>,
    store: Option<ActiveStore>,
    subscription: Option<Subscription>,
    changes: Option<Receiver<ChangedTable>>,
    containers: Vec<Container>,
    devices: Vec<Device>,
    log: Vec<UsageLogEntry>,
    loading: bool,
    mounted: bool,
    listeners: Vec<EventListener>,
}

impl InventoryManager {
    pub fn new(config: EnvConfig, local: LocalStore) -> Self {
        InventoryManager {
            config,
            local,
            identity: None,
            store: None,
            subscription: None,
            changes: None,
            containers: Vec::new(),
            devices: Vec::new(),
            log: Vec::new(),
            loading: false,
            mounted: false,
            listeners: Vec::new(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EnvConfig::from_env(), LocalStore::new())
    }

    /// Registers a change listener. Listeners must not call back into the
    /// manager; they are invoked synchronously during mutations.
    pub fn on_event(&mut self, listener: impl FnMut(InventoryEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Signals that the embedding client finished its first tick. Loading is
    /// suppressed until then so a half-initialized view never observes data.
    pub fn mount(&mut self) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        if self.identity.is_some() {
            self.load_snapshots();
        }
    }

    /// Installs the current actor (or clears it on sign-out) and re-runs
    /// mode arbitration. The previous subscription is dropped either way.
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        self.subscription = None;
        self.changes = None;
        self.identity = identity;
        self.store = arbitrate(&self.config, self.identity.as_ref(), &self.local);
        let mode = self.mode();
        self.emit(InventoryEvent::ModeChanged(mode));

        if let (Some(ActiveStore::Remote(remote)), Some(household_id)) = (
            &self.store,
            self.identity.as_ref().and_then(|i| i.household_id.clone()),
        ) {
            let (tx, rx): (Sender<ChangedTable>, Receiver<ChangedTable>) = channel();
            self.subscription = Some(remote.subscribe(&household_id, move |table| {
                let _ = tx.send(table);
            }));
            self.changes = Some(rx);
        }

        if self.identity.is_some() {
            if self.mounted {
                self.load_snapshots();
            }
        } else {
            self.containers.clear();
            self.devices.clear();
            self.log.clear();
            self.loading = false;
            self.emit(InventoryEvent::ContainersChanged);
            self.emit(InventoryEvent::DevicesChanged);
            self.emit(InventoryEvent::LogChanged);
        }
    }

    /// Reloads every snapshot from the active store. Subscriptions only
    /// cover containers and devices; views that need another member's log
    /// writes call this.
    pub fn refresh(&mut self) {
        if self.mounted && self.identity.is_some() {
            self.load_snapshots();
        }
    }

    /// Drains queued subscription notifications and re-fetches the affected
    /// table snapshots. Returns the number of tables refreshed.
    pub fn pump(&mut self) -> usize {
        let mut tables: Vec<ChangedTable> = Vec::new();
        if let Some(rx) = &self.changes {
            while let Ok(table) = rx.try_recv() {
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
        }
        for table in &tables {
            self.refresh_table(*table);
        }
        tables.len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn mode(&self) -> StoreMode {
        self.store.as_ref().map(ActiveStore::mode).unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn log(&self) -> &[UsageLogEntry] {
        &self.log
    }

    // ─────────────────────────────────────────────────────────────────────
    // Container mutations
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_container(&mut self, input: NewContainer) -> Result<Container> {
        let (user_id, household_id) = self.require_household()?;
        validation::validate_new_container(&input)?;

        let container = Container {
            id: Ulid::new().to_string(),
            name: input.name,
            location: input.location,
            compartments: input.compartments,
            household_id,
            created_by: user_id,
            created_at: Utc::now(),
        };

        match self.active_store()? {
            ActiveStore::Remote(remote) => {
                remote.insert_container(&container)?;
            }
            ActiveStore::Local(_) => {
                self.containers.insert(0, container.clone());
                self.persist_containers();
                self.emit(InventoryEvent::ContainersChanged);
            }
        }
        Ok(container)
    }

    /// Updates a container. Shrinking the compartment count below an
    /// existing device's compartment number is permitted; the orphaned
    /// devices are warned about here and surfaced by
    /// [`InventoryManager::orphaned_compartment_devices`], never clamped.
    pub fn update_container(&mut self, id: &str, patch: ContainerPatch) -> Result<()> {
        let (_, household_id) = self.require_household()?;
        validation::validate_container_patch(&patch)?;
        if patch.is_empty() {
            return Ok(());
        }

        if let Some(new_count) = patch.compartments {
            let orphaned: Vec<&str> = self
                .devices
                .iter()
                .filter(|d| {
                    d.storage_box.as_deref() == Some(id)
                        && d.compartment_number.is_some_and(|n| n > new_count)
                })
                .map(|d| d.name.as_str())
                .collect();
            if !orphaned.is_empty() {
                tracing::warn!(
                    container = id,
                    compartments = new_count,
                    devices = ?orphaned,
                    "Compartment count now below existing device compartments"
                );
            }
        }

        match self.active_store()? {
            ActiveStore::Remote(remote) => {
                remote.update_container(id, &household_id, &patch)?;
            }
            ActiveStore::Local(_) => {
                let container = self
                    .containers
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or_else(|| HearthError::validation("id", "unknown container"))?;
                container.apply(&patch);
                self.persist_containers();
                self.emit(InventoryEvent::ContainersChanged);
            }
        }
        Ok(())
    }

    /// Deletes a container. In remote mode the store's cascade clears the
    /// references on referring devices; in local mode the manager performs
    /// the cascade itself.
    pub fn delete_container(&mut self, id: &str) -> Result<()> {
        let (_, household_id) = self.require_household()?;

        match self.active_store()? {
            ActiveStore::Remote(remote) => {
                remote.delete_container(id, &household_id)?;
            }
            ActiveStore::Local(_) => {
                self.containers.retain(|c| c.id != id);
                for device in &mut self.devices {
                    if device.storage_box.as_deref() == Some(id) {
                        device.storage_box = None;
                        device.compartment_number = None;
                    }
                }
                self.persist_containers();
                self.persist_devices();
                self.emit(InventoryEvent::ContainersChanged);
                self.emit(InventoryEvent::DevicesChanged);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Device mutations
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_device(&mut self, input: NewDevice) -> Result<Device> {
        let (user_id, household_id) = self.require_household()?;
        validation::validate_new_device(&input, &self.containers)?;

        let device = Device {
            id: Ulid::new().to_string(),
            name: input.name,
            image: input
                .image
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            category: input.category,
            location: input.location,
            status: input.status,
            notes: input.notes,
            last_maintenance: input.last_maintenance,
            storage_box: input.storage_box,
            compartment_number: input.compartment_number,
            household_id,
            created_by: user_id,
            created_at: Utc::now(),
            current_user_id: None,
            current_location: HOME_LOCATION.to_string(),
        };

        match self.active_store()? {
            ActiveStore::Remote(remote) => {
                remote.insert_device(&device)?;
            }
            ActiveStore::Local(_) => {
                self.devices.insert(0, device.clone());
                self.persist_devices();
                self.emit(InventoryEvent::DevicesChanged);
            }
        }
        Ok(device)
    }

    pub fn update_device(&mut self, id: &str, patch: DevicePatch) -> Result<()> {
        let (_, household_id) = self.require_household()?;
        let device = query::device_by_id(&self.devices, id)
            .ok_or_else(|| HearthError::validation("id", "unknown device"))?;
        validation::validate_device_patch(device, &patch, &self.containers)?;

        match self.active_store()? {
            ActiveStore::Remote(remote) => {
                remote.update_device(id, &household_id, &patch)?;
            }
            ActiveStore::Local(_) => {
                if let Some(device) = self.devices.iter_mut().find(|d| d.id == id) {
                    device.apply(&patch);
                }
                self.persist_devices();
                self.emit(InventoryEvent::DevicesChanged);
            }
        }
        Ok(())
    }

    pub fn delete_device(&mut self, id: &str) -> Result<()> {
        let (_, household_id) = self.require_household()?;

        match self.active_store()? {
            ActiveStore::Remote(remote) => {
                remote.delete_device(id, &household_id)?;
            }
            ActiveStore::Local(_) => {
                self.devices.retain(|d| d.id != id);
                self.persist_devices();
                self.emit(InventoryEvent::DevicesChanged);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Custody
    // ─────────────────────────────────────────────────────────────────────

    /// Records that the current actor took a device to `location`.
    ///
    /// The log insert and the custody write are two sequential store calls,
    /// not a transaction: if the custody write fails, the open `taken` row
    /// stands while the device's fields are unchanged. The next `return`
    /// closes that row.
    pub fn take_device(
        &mut self,
        device_id: &str,
        location: &str,
        notes: Option<String>,
    ) -> Result<()> {
        let (remote, user_id, household_id) = self.custody_context()?;
        if location.trim().is_empty() {
            return Err(HearthError::validation("location", "must not be empty"));
        }
        self.require_known_device(device_id)?;

        remote.insert_log(&UsageLogEntry {
            id: Ulid::new().to_string(),
            device_id: device_id.to_string(),
            user_id: user_id.clone(),
            action: LogAction::Taken,
            location: location.to_string(),
            notes,
            taken_at: Utc::now(),
            returned_at: None,
            household_id: household_id.clone(),
        })?;

        let fields = custody::take(&user_id, location);
        remote.set_custody(device_id, &household_id, &fields)?;
        self.patch_device_custody(device_id, &fields);
        self.reload_log(&remote, &household_id);
        Ok(())
    }

    /// Returns a device to home base, closing its open `taken` row. No new
    /// log row is written, so a full take/return cycle is one entry.
    pub fn return_device(&mut self, device_id: &str) -> Result<()> {
        let (remote, _, household_id) = self.custody_context()?;
        self.require_known_device(device_id)?;

        remote.close_open_taken(device_id, Utc::now())?;

        let fields = custody::return_home();
        remote.set_custody(device_id, &household_id, &fields)?;
        self.patch_device_custody(device_id, &fields);
        self.reload_log(&remote, &household_id);
        Ok(())
    }

    /// Moves a device to `location`, preserving whoever currently holds it.
    /// The log insert and custody write are sequential, as in
    /// [`InventoryManager::take_device`].
    pub fn move_device(
        &mut self,
        device_id: &str,
        location: &str,
        notes: Option<String>,
    ) -> Result<()> {
        let (remote, user_id, household_id) = self.custody_context()?;
        if location.trim().is_empty() {
            return Err(HearthError::validation("location", "must not be empty"));
        }
        let device = self.require_known_device(device_id)?.clone();

        remote.insert_log(&UsageLogEntry {
            id: Ulid::new().to_string(),
            device_id: device_id.to_string(),
            user_id,
            action: LogAction::Moved,
            location: location.to_string(),
            notes,
            taken_at: Utc::now(),
            returned_at: None,
            household_id: household_id.clone(),
        })?;

        let fields = custody::move_to(&device, location);
        remote.set_custody(device_id, &household_id, &fields)?;
        self.patch_device_custody(device_id, &fields);
        self.reload_log(&remote, &household_id);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn container_by_id(&self, id: &str) -> Option<&Container> {
        query::container_by_id(&self.containers, id)
    }

    pub fn device_by_id(&self, id: &str) -> Option<&Device> {
        query::device_by_id(&self.devices, id)
    }

    pub fn filter_devices(&self, filter: &DeviceFilter) -> Vec<&Device> {
        query::filter_devices(&self.devices, filter)
    }

    pub fn summary(&self) -> InventorySummary {
        query::summary(&self.devices, &self.containers)
    }

    pub fn device_history(&self, device_id: &str) -> Vec<&UsageLogEntry> {
        query::history_of_device(&self.log, device_id)
    }

    pub fn filter_log(&self, filter: &LogFilter) -> Vec<&UsageLogEntry> {
        query::filter_log(&self.log, &self.devices, filter)
    }

    pub fn recent_log(&self, limit: usize) -> &[UsageLogEntry] {
        query::recent_log(&self.log, limit)
    }

    pub fn recent_devices(&self, limit: usize) -> &[Device] {
        query::recent_devices(&self.devices, limit)
    }

    /// Devices whose compartment number exceeds their container's current
    /// compartment count (a container edit shrank past them).
    pub fn orphaned_compartment_devices(&self) -> Vec<&Device> {
        query::orphaned_compartment_devices(&self.devices, &self.containers)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn emit(&mut self, event: InventoryEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    fn active_store(&self) -> Result<&ActiveStore> {
        self.store.as_ref().ok_or(HearthError::NotAuthenticated)
    }

    fn require_household(&self) -> Result<(String, String)> {
        let identity = self.identity.as_ref().ok_or(HearthError::NotAuthenticated)?;
        let household_id = identity
            .household_id
            .clone()
            .ok_or(HearthError::NoHousehold)?;
        Ok((identity.user_id.clone(), household_id))
    }

    /// Custody needs the remote store and a household; anything less cannot
    /// persist the log.
    fn custody_context(&self) -> Result<(SqliteRemote, String, String)> {
        let identity = self.identity.as_ref().ok_or(HearthError::NotAuthenticated)?;
        let remote = match self.active_store()? {
            ActiveStore::Remote(remote) => remote.clone(),
            ActiveStore::Local(_) => return Err(HearthError::LogUnavailable),
        };
        let household_id = identity
            .household_id
            .clone()
            .ok_or(HearthError::LogUnavailable)?;
        Ok((remote, identity.user_id.clone(), household_id))
    }

    fn require_known_device(&self, id: &str) -> Result<&Device> {
        query::device_by_id(&self.devices, id)
            .ok_or_else(|| HearthError::validation("id", "unknown device"))
    }

    fn patch_device_custody(&mut self, device_id: &str, fields: &custody::CustodyFields) {
        if let Some(device) = self.devices.iter_mut().find(|d| d.id == device_id) {
            fields.apply_to(device);
        }
        self.emit(InventoryEvent::DevicesChanged);
    }

    fn reload_log(&mut self, remote: &SqliteRemote, household_id: &str) {
        match remote.list_log(household_id) {
            Ok(log) => {
                self.log = log;
                self.emit(InventoryEvent::LogChanged);
            }
            Err(err) => {
                tracing::warn!(%err, "Failed to reload usage log, keeping previous snapshot");
            }
        }
    }

    fn load_snapshots(&mut self) {
        self.loading = true;

        enum Plan {
            Remote(SqliteRemote, Option<String>),
            Local(LocalStore, String),
            Idle,
        }

        let plan = match (&self.store, &self.identity) {
            (Some(ActiveStore::Remote(remote)), Some(identity)) => {
                Plan::Remote(remote.clone(), identity.household_id.clone())
            }
            (Some(ActiveStore::Local(local)), Some(identity)) => {
                Plan::Local(local.clone(), identity.user_id.clone())
            }
            _ => Plan::Idle,
        };

        match plan {
            Plan::Remote(remote, Some(household_id)) => {
                self.containers = remote.list_containers(&household_id).unwrap_or_else(|err| {
                    tracing::warn!(%err, "Failed to load containers, starting empty");
                    Vec::new()
                });
                self.devices = remote.list_devices(&household_id).unwrap_or_else(|err| {
                    tracing::warn!(%err, "Failed to load devices, starting empty");
                    Vec::new()
                });
                self.log = remote.list_log(&household_id).unwrap_or_else(|err| {
                    tracing::warn!(%err, "Failed to load usage log, starting empty");
                    Vec::new()
                });
            }
            Plan::Remote(_, None) => {
                // signed in but not yet in a household: nothing to show
                self.containers.clear();
                self.devices.clear();
                self.log.clear();
            }
            Plan::Local(local, actor) => {
                self.containers = local.load_containers(&actor);
                self.devices = local.load_devices(&actor);
                self.log.clear();
            }
            Plan::Idle => {
                self.containers.clear();
                self.devices.clear();
                self.log.clear();
            }
        }

        self.loading = false;
        self.emit(InventoryEvent::ContainersChanged);
        self.emit(InventoryEvent::DevicesChanged);
        self.emit(InventoryEvent::LogChanged);
    }

    fn refresh_table(&mut self, table: ChangedTable) {
        let context = match (&self.store, &self.identity) {
            (Some(ActiveStore::Remote(remote)), Some(identity)) => identity
                .household_id
                .clone()
                .map(|household_id| (remote.clone(), household_id)),
            _ => None,
        };
        let Some((remote, household_id)) = context else {
            return;
        };

        match table {
            ChangedTable::Containers => match remote.list_containers(&household_id) {
                Ok(containers) => {
                    self.containers = containers;
                    self.emit(InventoryEvent::ContainersChanged);
                }
                Err(err) => {
                    tracing::warn!(%err, "Failed to refresh containers, keeping previous snapshot");
                }
            },
            ChangedTable::Devices => match remote.list_devices(&household_id) {
                Ok(devices) => {
                    self.devices = devices;
                    self.emit(InventoryEvent::DevicesChanged);
                }
                Err(err) => {
                    tracing::warn!(%err, "Failed to refresh devices, keeping previous snapshot");
                }
            },
        }
    }

    // Local saves are fire-and-forget: a failure is logged and the next
    // successful save re-establishes consistency.
    fn persist_containers(&self) {
        if let Some(identity) = &self.identity {
            if let Err(err) = self.local.save_containers(&identity.user_id, &self.containers) {
                tracing::warn!(%err, "Failed to save containers snapshot");
            }
        }
    }

    fn persist_devices(&self) {
        if let Some(identity) = &self.identity {
            if let Err(err) = self.local.save_devices(&identity.user_id, &self.devices) {
                tracing::warn!(%err, "Failed to save devices snapshot");
            }
        }
    }
}
