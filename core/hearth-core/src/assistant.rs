//! Assistant collaborator contract.
//!
//! The hosted language model lives outside the core: the embedding client
//! calls [`ensure_configured`] and, when that fails with
//! `AssistantUnavailable`, answers from the built-in rule-based responder
//! instead. [`local_response`] is that responder: a pure function over the
//! current snapshots, no state, no mutation feedback.

use crate::config::EnvConfig;
use crate::error::{HearthError, Result};
use crate::types::{Container, Device, DeviceStatus};

/// Fails with `AssistantUnavailable` when the assistant key is absent.
pub fn ensure_configured(config: &EnvConfig) -> Result<()> {
    if config.assistant_configured() {
        Ok(())
    } else {
        Err(HearthError::AssistantUnavailable)
    }
}

/// Answers inventory questions from the snapshots alone.
///
/// Understands four question shapes: locating a device ("where is the
/// drill"), repair status, inventory counts, and listing storage boxes.
/// Anything else gets the help text.
pub fn local_response(question: &str, devices: &[Device], containers: &[Container]) -> String {
    let q = question.to_lowercase();

    if q.contains("where") || q.contains("find") {
        if let Some(device) = devices
            .iter()
            .find(|d| q.contains(&d.name.to_lowercase()))
        {
            return locate(device, containers);
        }
        return "I couldn't find that device. Try asking with its exact name.".to_string();
    }

    if q.contains("repair") || q.contains("broken") || q.contains("fix") {
        let ailing: Vec<&Device> = devices
            .iter()
            .filter(|d| d.status != DeviceStatus::Working)
            .collect();
        if ailing.is_empty() {
            return "Everything is in working order.".to_string();
        }
        let names: Vec<String> = ailing
            .iter()
            .map(|d| format!("{} ({})", d.name, d.status.as_str()))
            .collect();
        return format!("Needs attention: {}.", names.join(", "));
    }

    if q.contains("how many") || q.contains("count") {
        return format!(
            "You have {} devices and {} storage boxes.",
            devices.len(),
            containers.len()
        );
    }

    if q.contains("box") || q.contains("container") || q.contains("storage") {
        if containers.is_empty() {
            return "You have no storage boxes yet.".to_string();
        }
        let names: Vec<String> = containers
            .iter()
            .map(|c| format!("{} ({}, {} compartments)", c.name, c.location, c.compartments))
            .collect();
        return format!("Your storage boxes: {}.", names.join("; "));
    }

    "I can help you find devices, check what needs repair, count your inventory, \
     or list your storage boxes. What would you like to know?"
        .to_string()
}

fn locate(device: &Device, containers: &[Container]) -> String {
    if let Some(user_id) = &device.current_user_id {
        return format!(
            "{} is currently with {} at {}.",
            device.name, user_id, device.current_location
        );
    }
    if device.current_location != crate::types::HOME_LOCATION {
        return format!("{} is at {}.", device.name, device.current_location);
    }
    match (&device.storage_box, device.compartment_number) {
        (Some(box_id), Some(compartment)) => {
            let box_name = containers
                .iter()
                .find(|c| &c.id == box_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| box_id.clone());
            format!(
                "{} is in {}, compartment {}.",
                device.name, box_name, compartment
            )
        }
        _ => format!("{} is at its home location: {}.", device.name, device.location),
    }
}
