//! Built-in example dataset.
//!
//! Used by the local store whenever a snapshot is missing or unreadable, so
//! a fresh (or corrupted) install always has something to show.

use chrono::{DateTime, NaiveDate, Utc};

use crate::types::{Container, Device, DeviceStatus, HOME_LOCATION, PLACEHOLDER_IMAGE};

const SEED_SCOPE: &str = "sample";

fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("seed timestamp is valid RFC 3339")
}

fn date(raw: &str) -> NaiveDate {
    raw.parse().expect("seed date is valid ISO 8601")
}

pub fn seed_containers() -> Vec<Container> {
    vec![
        Container {
            id: "box1".to_string(),
            name: "Pinsa Electrics Box 1".to_string(),
            location: "Garage Shelf".to_string(),
            compartments: 12,
            household_id: SEED_SCOPE.to_string(),
            created_by: SEED_SCOPE.to_string(),
            created_at: ts("2022-10-01T00:00:00Z"),
        },
        Container {
            id: "box2".to_string(),
            name: "Tools Box".to_string(),
            location: "Workshop".to_string(),
            compartments: 8,
            household_id: SEED_SCOPE.to_string(),
            created_by: SEED_SCOPE.to_string(),
            created_at: ts("2022-12-01T00:00:00Z"),
        },
    ]
}

pub fn seed_devices() -> Vec<Device> {
    vec![
        Device {
            id: "1".to_string(),
            name: "Power Drill".to_string(),
            image: PLACEHOLDER_IMAGE.to_string(),
            category: "Power Tools".to_string(),
            location: "Garage".to_string(),
            status: DeviceStatus::Working,
            notes: "Black & Decker, 18V".to_string(),
            last_maintenance: Some(date("2023-10-15")),
            storage_box: Some("box2".to_string()),
            compartment_number: Some(3),
            household_id: SEED_SCOPE.to_string(),
            created_by: SEED_SCOPE.to_string(),
            created_at: ts("2023-01-15T00:00:00Z"),
            current_user_id: None,
            current_location: HOME_LOCATION.to_string(),
        },
        Device {
            id: "2".to_string(),
            name: "Soldering Iron".to_string(),
            image: PLACEHOLDER_IMAGE.to_string(),
            category: "Electronics".to_string(),
            location: "Workshop".to_string(),
            status: DeviceStatus::Working,
            notes: "Weller, 40W".to_string(),
            last_maintenance: Some(date("2023-09-20")),
            storage_box: Some("box1".to_string()),
            compartment_number: Some(5),
            household_id: SEED_SCOPE.to_string(),
            created_by: SEED_SCOPE.to_string(),
            created_at: ts("2022-11-05T00:00:00Z"),
            current_user_id: None,
            current_location: HOME_LOCATION.to_string(),
        },
        Device {
            id: "3".to_string(),
            name: "Electric Kettle".to_string(),
            image: PLACEHOLDER_IMAGE.to_string(),
            category: "Kitchen Appliances".to_string(),
            location: "Kitchen".to_string(),
            status: DeviceStatus::NeedsRepair,
            notes: "Heating element seems weak".to_string(),
            last_maintenance: None,
            storage_box: None,
            compartment_number: None,
            household_id: SEED_SCOPE.to_string(),
            created_by: SEED_SCOPE.to_string(),
            created_at: ts("2022-05-10T00:00:00Z"),
            current_user_id: None,
            current_location: HOME_LOCATION.to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_sizes() {
        assert_eq!(seed_containers().len(), 2);
        assert_eq!(seed_devices().len(), 3);
    }

    #[test]
    fn test_seed_references_are_consistent() {
        let containers = seed_containers();
        for device in seed_devices() {
            match (device.storage_box.as_deref(), device.compartment_number) {
                (None, None) => {}
                (Some(box_id), Some(compartment)) => {
                    let container = containers
                        .iter()
                        .find(|c| c.id == box_id)
                        .expect("seed device references a seed container");
                    assert!(compartment >= 1 && compartment <= container.compartments);
                }
                other => panic!("seed device with half-set container reference: {:?}", other),
            }
        }
    }

    #[test]
    fn test_seed_devices_start_at_home() {
        for device in seed_devices() {
            assert_eq!(device.current_user_id, None);
            assert_eq!(device.current_location, HOME_LOCATION);
        }
    }
}
