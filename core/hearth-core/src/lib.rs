//! hearth-core: household inventory data plane.
//!
//! Members of a household register devices and storage containers, record
//! custody transitions (take, return, move) in an auditable usage log, and
//! query derived views. The crate is the client-side core behind such a UI:
//!
//! - [`manager::InventoryManager`] owns the authoritative snapshots and
//!   routes mutations through the active store.
//! - [`remote::SqliteRemote`] is the household's shared store with change
//!   subscriptions; [`local::LocalStore`] is the per-actor offline fallback.
//! - [`mode::arbitrate`] picks between them once per identity change.
//! - [`custody`] is the pure take/return/move state machine; [`query`] the
//!   pure derivations (filter, summary, history).
//!
//! The crate is synchronous and single-owner. Subscription callbacks only
//! enqueue; callers drain them with [`manager::InventoryManager::pump`].

pub mod assistant;
pub mod config;
pub mod custody;
pub mod error;
pub mod identity;
pub mod local;
pub mod manager;
pub mod mode;
pub mod query;
pub mod remote;
pub mod seed;
pub mod types;
pub mod validation;

pub use config::EnvConfig;
pub use custody::{CustodyFields, CustodyState};
pub use error::{HearthError, Result};
pub use identity::Identity;
pub use local::LocalStore;
pub use manager::{InventoryEvent, InventoryManager};
pub use mode::{ActiveStore, StoreMode};
pub use remote::{ChangedTable, SqliteRemote, Subscription};
pub use types::{
    Container, ContainerPatch, Device, DeviceFilter, DevicePatch, DeviceStatus, InventorySummary,
    LogAction, LogFilter, NewContainer, NewDevice, UsageLogEntry, HOME_LOCATION, LOCATION_PRESETS,
    MAX_COMPARTMENTS, PLACEHOLDER_IMAGE,
};
