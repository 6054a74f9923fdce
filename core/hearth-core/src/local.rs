//! Per-actor JSON persistence for offline mode.
//!
//! Snapshots live under `<root>/containers/<actor>.json` and
//! `<root>/devices/<actor>.json`, each holding the serialized list verbatim.
//! There is no usage-log storage: local mode is degraded and custody
//! operations are rejected upstream.
//!
//! # Defensive Design
//!
//! Loads never fail: a missing, empty, or corrupt snapshot falls back to the
//! seed dataset with a logged warning, and the next successful save replaces
//! the bad file.
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-save cannot leave a torn snapshot.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{HearthError, Result};
use crate::seed::{seed_containers, seed_devices};
use crate::types::{Container, Device};

/// File-backed store keyed by actor id.
///
/// Production code uses [`LocalStore::new`] which points at `~/.hearth/`;
/// tests use [`LocalStore::with_root`] for isolation.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl Default for LocalStore {
    fn default() -> Self {
        let home = dirs::home_dir().expect("Could not find home directory");
        LocalStore {
            root: home.join(".hearth"),
        }
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: PathBuf) -> Self {
        LocalStore { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn containers_file(&self, actor: &str) -> PathBuf {
        self.root.join("containers").join(format!("{}.json", actor))
    }

    fn devices_file(&self, actor: &str) -> PathBuf {
        self.root.join("devices").join(format!("{}.json", actor))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Loads (infallible, seed fallback)
    // ─────────────────────────────────────────────────────────────────────

    pub fn load_containers(&self, actor: &str) -> Vec<Container> {
        load_or_seed(&self.containers_file(actor), "containers", seed_containers)
    }

    pub fn load_devices(&self, actor: &str) -> Vec<Device> {
        load_or_seed(&self.devices_file(actor), "devices", seed_devices)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Saves (replace-all)
    // ─────────────────────────────────────────────────────────────────────

    pub fn save_containers(&self, actor: &str, containers: &[Container]) -> Result<()> {
        save_snapshot(&self.containers_file(actor), containers)
    }

    pub fn save_devices(&self, actor: &str, devices: &[Device]) -> Result<()> {
        save_snapshot(&self.devices_file(actor), devices)
    }
}

fn load_or_seed<T: DeserializeOwned>(
    path: &Path,
    what: &'static str,
    seed: fn() -> Vec<T>,
) -> Vec<T> {
    if !path.exists() {
        return seed();
    }

    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(%err, what, "Failed to read local snapshot, using seed dataset");
            return seed();
        }
    };

    if content.trim().is_empty() {
        tracing::warn!(what, "Empty local snapshot, using seed dataset");
        return seed();
    }

    match serde_json::from_str(&content) {
        Ok(list) => list,
        Err(err) => {
            tracing::warn!(%err, what, "Failed to parse local snapshot, using seed dataset");
            seed()
        }
    }
}

fn save_snapshot<T: Serialize>(path: &Path, list: &[T]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| HearthError::Io {
        context: "snapshot path has no parent directory".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent"),
    })?;
    fs_err::create_dir_all(parent).map_err(|source| HearthError::Io {
        context: format!("creating {}", parent.display()),
        source,
    })?;

    let content = serde_json::to_string_pretty(list).map_err(|source| HearthError::Json {
        context: "serializing local snapshot".to_string(),
        source,
    })?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|source| HearthError::Io {
        context: "creating temp snapshot file".to_string(),
        source,
    })?;
    temp.write_all(content.as_bytes())
        .map_err(|source| HearthError::Io {
            context: "writing temp snapshot file".to_string(),
            source,
        })?;
    temp.flush().map_err(|source| HearthError::Io {
        context: "flushing temp snapshot file".to_string(),
        source,
    })?;
    temp.persist(path).map_err(|err| HearthError::Io {
        context: format!("persisting {}", path.display()),
        source: err.error,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, LocalStore) {
        let temp = tempdir().unwrap();
        let store = LocalStore::with_root(temp.path().to_path_buf());
        (temp, store)
    }

    #[test]
    fn test_missing_snapshot_returns_seed() {
        let (_temp, store) = store();
        assert_eq!(store.load_devices("u1").len(), 3);
        assert_eq!(store.load_containers("u1").len(), 2);
    }

    #[test]
    fn test_round_trip_preserves_data() {
        let (_temp, store) = store();
        let mut devices = seed_devices();
        devices[0].name = "Impact Driver".to_string();

        store.save_devices("u1", &devices).unwrap();
        let loaded = store.load_devices("u1");

        assert_eq!(loaded, devices);
    }

    #[test]
    fn test_corrupt_snapshot_returns_seed() {
        let (_temp, store) = store();
        let path = store.root().join("devices").join("u1.json");
        fs_err::create_dir_all(path.parent().unwrap()).unwrap();
        fs_err::write(&path, "{bogus").unwrap();

        let loaded = store.load_devices("u1");
        assert_eq!(loaded, seed_devices());
    }

    #[test]
    fn test_save_replaces_corrupt_snapshot() {
        let (_temp, store) = store();
        let path = store.root().join("devices").join("u1.json");
        fs_err::create_dir_all(path.parent().unwrap()).unwrap();
        fs_err::write(&path, "{bogus").unwrap();

        store.save_devices("u1", &seed_devices()).unwrap();
        assert_eq!(store.load_devices("u1"), seed_devices());
    }

    #[test]
    fn test_empty_snapshot_returns_seed() {
        let (_temp, store) = store();
        let path = store.root().join("containers").join("u1.json");
        fs_err::create_dir_all(path.parent().unwrap()).unwrap();
        fs_err::write(&path, "").unwrap();

        assert_eq!(store.load_containers("u1"), seed_containers());
    }

    #[test]
    fn test_snapshots_are_scoped_per_actor() {
        let (_temp, store) = store();
        store.save_devices("u1", &[]).unwrap();

        assert!(store.load_devices("u1").is_empty());
        // u2 has no snapshot and still gets the seed
        assert_eq!(store.load_devices("u2").len(), 3);
    }

    #[test]
    fn test_empty_list_round_trips_as_empty() {
        // An explicitly saved empty list is a valid snapshot, not a miss
        let (_temp, store) = store();
        store.save_containers("u1", &[]).unwrap();
        assert!(store.load_containers("u1").is_empty());
    }
}
