//! End-to-end scenarios driving the state manager against real stores:
//! a shared SQLite file standing in for the household's remote store, and
//! per-actor JSON snapshots for local mode.

use hearth_core::{
    DeviceFilter, DevicePatch, DeviceStatus, EnvConfig, HearthError, Identity, InventoryManager,
    LocalStore, NewContainer, NewDevice, StoreMode, HOME_LOCATION,
};
use tempfile::TempDir;

fn remote_manager(temp: &TempDir, user: &str, household: &str) -> InventoryManager {
    let config = EnvConfig {
        sync_url: Some(temp.path().join("household.db").display().to_string()),
        sync_key: Some("anon".to_string()),
        assistant_key: None,
    };
    let local = LocalStore::with_root(temp.path().join(format!("local-{}", user)));
    let mut manager = InventoryManager::new(config, local);
    manager.mount();
    manager.set_identity(Some(Identity::with_household(user, household)));
    manager
}

fn local_manager(temp: &TempDir, user: &str, household: Option<&str>) -> InventoryManager {
    let mut manager = InventoryManager::new(
        EnvConfig::default(),
        LocalStore::with_root(temp.path().to_path_buf()),
    );
    manager.mount();
    let identity = match household {
        Some(hh) => Identity::with_household(user, hh),
        None => Identity::new(user),
    };
    manager.set_identity(Some(identity));
    manager
}

fn new_container(name: &str, compartments: u32) -> NewContainer {
    NewContainer {
        name: name.to_string(),
        location: "Garage".to_string(),
        compartments,
    }
}

fn new_device(name: &str) -> NewDevice {
    NewDevice {
        name: name.to_string(),
        category: "Power Tools".to_string(),
        location: "Garage".to_string(),
        ..Default::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Take then return
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_take_then_return_cycle() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");
    assert_eq!(manager.mode(), StoreMode::Remote);

    let device = manager.add_device(new_device("Drill")).unwrap();
    manager.pump();

    manager
        .take_device(&device.id, "office", Some("demo".to_string()))
        .unwrap();

    let taken = manager.device_by_id(&device.id).unwrap();
    assert_eq!(taken.current_user_id.as_deref(), Some("alex"));
    assert_eq!(taken.current_location, "office");

    let history = manager.device_history(&device.id);
    assert_eq!(history.len(), 1);
    assert!(history[0].is_open_taken());
    assert_eq!(history[0].notes.as_deref(), Some("demo"));

    manager.return_device(&device.id).unwrap();

    let returned = manager.device_by_id(&device.id).unwrap();
    assert_eq!(returned.current_user_id, None);
    assert_eq!(returned.current_location, HOME_LOCATION);

    // return closes the open row instead of appending a new one
    let history = manager.device_history(&device.id);
    assert_eq!(history.len(), 1);
    assert!(history[0].returned_at.is_some());
}

#[test]
fn test_move_preserves_holder_and_appends_log() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");
    let device = manager.add_device(new_device("Drill")).unwrap();
    manager.pump();

    manager.take_device(&device.id, "office", None).unwrap();
    manager.move_device(&device.id, "workshop", None).unwrap();

    let moved = manager.device_by_id(&device.id).unwrap();
    assert_eq!(moved.current_user_id.as_deref(), Some("alex"));
    assert_eq!(moved.current_location, "workshop");

    let history = manager.device_history(&device.id);
    assert_eq!(history.len(), 2);
    // the taken row stays open across moves
    assert_eq!(history.iter().filter(|e| e.is_open_taken()).count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Cascade on container delete
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_container_delete_cascades_in_remote_mode() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");

    let container = manager.add_container(new_container("Crate", 4)).unwrap();
    manager.pump();

    let boxed = manager
        .add_device(NewDevice {
            storage_box: Some(container.id.clone()),
            compartment_number: Some(3),
            ..new_device("Drill")
        })
        .unwrap();
    let loose = manager.add_device(new_device("Kettle")).unwrap();
    manager.pump();

    manager.delete_container(&container.id).unwrap();
    manager.pump();

    assert!(manager.container_by_id(&container.id).is_none());
    let formerly_boxed = manager.device_by_id(&boxed.id).unwrap();
    assert_eq!(formerly_boxed.storage_box, None);
    assert_eq!(formerly_boxed.compartment_number, None);
    let unchanged = manager.device_by_id(&loose.id).unwrap();
    assert_eq!(unchanged.storage_box, None);
    assert_eq!(unchanged.name, "Kettle");
}

// ─────────────────────────────────────────────────────────────────────────────
// Filtering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_filter_conjunction() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");

    let wanted = manager
        .add_device(NewDevice {
            category: "tool".to_string(),
            status: DeviceStatus::Working,
            ..new_device("D1")
        })
        .unwrap();
    manager
        .add_device(NewDevice {
            category: "tool".to_string(),
            status: DeviceStatus::Broken,
            ..new_device("D2")
        })
        .unwrap();
    manager
        .add_device(NewDevice {
            category: "kitchen".to_string(),
            status: DeviceStatus::Working,
            ..new_device("D3")
        })
        .unwrap();
    manager.pump();

    let matched = manager.filter_devices(&DeviceFilter {
        category: Some("tool".to_string()),
        status: Some(DeviceStatus::Working),
        ..Default::default()
    });
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, wanted.id);

    // the empty filter matches everything
    assert_eq!(manager.filter_devices(&DeviceFilter::default()).len(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Local seed on corrupt storage
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_local_seed_on_corrupt_storage() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("devices").join("alex.json");
    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(&path, "{bogus").unwrap();

    let mut manager = local_manager(&temp, "alex", Some("hh1"));
    assert_eq!(manager.devices().len(), 3);

    // the next save replaces the corrupt snapshot
    manager.delete_device("3").unwrap();
    let reopened = local_manager(&temp, "alex", Some("hh1"));
    assert_eq!(reopened.devices().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Mode arbitration without config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unconfigured_environment_forces_local_and_degrades_custody() {
    let temp = TempDir::new().unwrap();
    let mut manager = local_manager(&temp, "alex", Some("hh1"));
    assert_eq!(manager.mode(), StoreMode::Local);

    let result = manager.take_device("1", "office", None);
    assert!(matches!(result, Err(HearthError::LogUnavailable)));
}

#[test]
fn test_local_creation_without_household_fails() {
    let temp = TempDir::new().unwrap();
    let mut manager = local_manager(&temp, "alex", None);
    let result = manager.add_device(new_device("Drill"));
    assert!(matches!(result, Err(HearthError::NoHousehold)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrent take race between household members
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_concurrent_take_race_resolves_on_return() {
    let temp = TempDir::new().unwrap();
    let mut alex = remote_manager(&temp, "alex", "hh1");
    let mut brook = remote_manager(&temp, "brook", "hh1");

    let device = alex.add_device(new_device("Drill")).unwrap();
    alex.pump();
    brook.pump();

    alex.take_device(&device.id, "L1", None).unwrap();
    brook.take_device(&device.id, "L2", None).unwrap();

    // both inserts landed; the open-row invariant is violated momentarily.
    // brook took second, so its log reload sees both rows in commit order
    let history = brook.device_history(&device.id);
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|e| e.is_open_taken()).count(), 2);
    assert_eq!(history[0].location, "L2");

    // one return closes only the most recent open row
    alex.return_device(&device.id).unwrap();
    let history = alex.device_history(&device.id);
    let open: Vec<_> = history.iter().filter(|e| e.is_open_taken()).collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].location, "L1");
}

// ─────────────────────────────────────────────────────────────────────────────
// Echo semantics
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_crud_writes_wait_for_the_echo() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");

    let container = manager.add_container(new_container("Crate", 4)).unwrap();
    // no optimistic patch: the snapshot is unchanged until the echo lands
    assert!(manager.container_by_id(&container.id).is_none());

    assert_eq!(manager.pump(), 1);
    assert!(manager.container_by_id(&container.id).is_some());
}

#[test]
fn test_echo_after_custody_patch_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");
    let device = manager.add_device(new_device("Drill")).unwrap();
    manager.pump();

    manager.take_device(&device.id, "office", None).unwrap();
    let eager = manager.devices().to_vec();

    // the subscription echo replays the same rows
    manager.pump();
    assert_eq!(manager.devices(), &eager[..]);
}

#[test]
fn test_subscription_propagates_between_members() {
    let temp = TempDir::new().unwrap();
    let mut alex = remote_manager(&temp, "alex", "hh1");
    let mut brook = remote_manager(&temp, "brook", "hh1");

    let device = alex.add_device(new_device("Drill")).unwrap();
    assert!(brook.device_by_id(&device.id).is_none());

    brook.pump();
    assert!(brook.device_by_id(&device.id).is_some());
}

#[test]
fn test_households_are_isolated() {
    let temp = TempDir::new().unwrap();
    let mut alex = remote_manager(&temp, "alex", "hh1");
    let mut casey = remote_manager(&temp, "casey", "hh2");

    alex.add_device(new_device("Drill")).unwrap();
    alex.pump();
    casey.pump();

    assert_eq!(alex.devices().len(), 1);
    assert!(casey.devices().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Invariants under mutation sequences
// ─────────────────────────────────────────────────────────────────────────────

fn assert_placement_paired(manager: &InventoryManager) {
    for device in manager.devices() {
        assert_eq!(
            device.storage_box.is_none(),
            device.compartment_number.is_none(),
            "device {} has a half-set container reference",
            device.id
        );
    }
}

#[test]
fn test_placement_pairing_holds_across_mutations() {
    let temp = TempDir::new().unwrap();
    let mut manager = local_manager(&temp, "alex", Some("hh1"));
    assert_placement_paired(&manager);

    let container = manager.add_container(new_container("Crate", 4)).unwrap();
    manager
        .add_device(NewDevice {
            storage_box: Some(container.id.clone()),
            compartment_number: Some(1),
            ..new_device("Drill")
        })
        .unwrap();
    assert_placement_paired(&manager);

    // a patch that would break the pairing is rejected
    let err = manager.update_device(
        "1",
        DevicePatch {
            compartment_number: Some(None),
            ..Default::default()
        },
    );
    assert!(err.is_err());
    assert_placement_paired(&manager);

    manager.delete_container(&container.id).unwrap();
    assert_placement_paired(&manager);
}

#[test]
fn test_history_is_ordered_most_recent_first() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");
    let device = manager.add_device(new_device("Drill")).unwrap();
    manager.pump();

    manager.take_device(&device.id, "office", None).unwrap();
    manager.move_device(&device.id, "garage", None).unwrap();
    manager.return_device(&device.id).unwrap();
    manager.move_device(&device.id, "basement", None).unwrap();

    let history = manager.device_history(&device.id);
    assert!(history.len() >= 3);
    for pair in history.windows(2) {
        assert!(pair[0].taken_at >= pair[1].taken_at);
    }
    // at most one open taken row survives the sequence
    assert!(history.iter().filter(|e| e.is_open_taken()).count() <= 1);
}

#[test]
fn test_summary_tracks_status_counts() {
    let temp = TempDir::new().unwrap();
    let mut manager = remote_manager(&temp, "alex", "hh1");
    manager.add_container(new_container("Crate", 4)).unwrap();
    manager
        .add_device(NewDevice {
            status: DeviceStatus::Broken,
            ..new_device("Kettle")
        })
        .unwrap();
    manager.add_device(new_device("Drill")).unwrap();
    manager.pump();

    let summary = manager.summary();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.working, 1);
    assert_eq!(summary.broken, 1);
    assert_eq!(summary.containers, 1);
}
