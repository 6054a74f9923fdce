//! Mode arbitration between the shared remote store and the local fallback.
//!
//! Runs once per identity change, never again in between: a remote store
//! that dies mid-session surfaces as `RemoteFailure` on the next write
//! rather than a silent mode flip.

use crate::config::EnvConfig;
use crate::identity::Identity;
use crate::local::LocalStore;
use crate::remote::SqliteRemote;

/// The arbiter's published decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreMode {
    /// No actor yet; nothing is loaded.
    #[default]
    Unknown,
    Remote,
    Local,
}

/// The adapter selected by arbitration. Holding the adapter inside the
/// variant means remote operations can never run without a remote store.
pub enum ActiveStore {
    Remote(SqliteRemote),
    Local(LocalStore),
}

impl ActiveStore {
    pub fn mode(&self) -> StoreMode {
        match self {
            ActiveStore::Remote(_) => StoreMode::Remote,
            ActiveStore::Local(_) => StoreMode::Local,
        }
    }
}

/// Decides the mode for the given identity.
///
/// No actor: stay idle. No remote configuration: local. Otherwise the remote
/// store must open and answer the liveness probe, or we fall back to local.
pub fn arbitrate(
    config: &EnvConfig,
    identity: Option<&Identity>,
    local: &LocalStore,
) -> Option<ActiveStore> {
    identity?;

    if !config.remote_configured() {
        tracing::debug!("Remote store not configured, using local mode");
        return Some(ActiveStore::Local(local.clone()));
    }

    // remote_configured() guarantees the URL is present
    let url = config.sync_url.as_deref()?;
    match SqliteRemote::open(url) {
        Ok(remote) if remote.probe() => Some(ActiveStore::Remote(remote)),
        Ok(_) => {
            tracing::warn!("Remote store probe failed, falling back to local mode");
            Some(ActiveStore::Local(local.clone()))
        }
        Err(err) => {
            tracing::warn!(%err, "Failed to open remote store, falling back to local mode");
            Some(ActiveStore::Local(local.clone()))
        }
    }
}
