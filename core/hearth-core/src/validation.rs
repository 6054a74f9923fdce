//! Structural validation for container and device inputs.
//!
//! Validation is a hard gate: a compartment number outside the referenced
//! container's range is rejected, not clamped or downgraded to a hint.
//! Callers that want softer behavior can pre-check and present warnings.

use crate::error::{HearthError, Result};
use crate::types::{
    Container, ContainerPatch, Device, DevicePatch, NewContainer, NewDevice, MAX_COMPARTMENTS,
};

pub fn validate_new_container(input: &NewContainer) -> Result<()> {
    validate_name(&input.name)?;
    validate_location(&input.location)?;
    validate_compartments(input.compartments)
}

pub fn validate_container_patch(patch: &ContainerPatch) -> Result<()> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(location) = &patch.location {
        validate_location(location)?;
    }
    if let Some(compartments) = patch.compartments {
        validate_compartments(compartments)?;
    }
    Ok(())
}

pub fn validate_new_device(input: &NewDevice, containers: &[Container]) -> Result<()> {
    validate_name(&input.name)?;
    validate_location(&input.location)?;
    validate_placement(
        input.storage_box.as_deref(),
        input.compartment_number,
        containers,
    )
}

/// Validates a device patch against the state it would produce, so that a
/// patch setting only one half of the container reference is caught.
pub fn validate_device_patch(
    device: &Device,
    patch: &DevicePatch,
    containers: &[Container],
) -> Result<()> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    if let Some(location) = &patch.location {
        validate_location(location)?;
    }

    let mut patched = device.clone();
    patched.apply(patch);
    validate_placement(
        patched.storage_box.as_deref(),
        patched.compartment_number,
        containers,
    )
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(HearthError::validation("name", "must not be empty"));
    }
    Ok(())
}

fn validate_location(location: &str) -> Result<()> {
    if location.trim().is_empty() {
        return Err(HearthError::validation("location", "must not be empty"));
    }
    Ok(())
}

fn validate_compartments(compartments: u32) -> Result<()> {
    if compartments < 1 || compartments > MAX_COMPARTMENTS {
        return Err(HearthError::validation(
            "compartments",
            format!("must be between 1 and {}", MAX_COMPARTMENTS),
        ));
    }
    Ok(())
}

/// Container reference and compartment number are both set or both absent,
/// and the number must fall within the referenced container's range.
fn validate_placement(
    storage_box: Option<&str>,
    compartment_number: Option<u32>,
    containers: &[Container],
) -> Result<()> {
    match (storage_box, compartment_number) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(HearthError::validation(
            "compartment_number",
            "required when a storage box is set",
        )),
        (None, Some(_)) => Err(HearthError::validation(
            "storage_box",
            "required when a compartment number is set",
        )),
        (Some(box_id), Some(number)) => {
            let container = containers
                .iter()
                .find(|c| c.id == box_id)
                .ok_or_else(|| HearthError::validation("storage_box", "unknown container"))?;
            if number < 1 || number > container.compartments {
                return Err(HearthError::validation(
                    "compartment_number",
                    format!("must be between 1 and {}", container.compartments),
                ));
            }
            Ok(())
        }
    }
}
