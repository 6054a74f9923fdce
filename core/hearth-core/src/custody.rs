//! Custody state machine.
//!
//! A device's custody is the pair (current holder, current location). Three
//! states fall out of the field values:
//!
//! - `Home`: no holder, location is the `home` sentinel.
//! - `Out`: a holder has the device at some location.
//! - `Placed`: no holder, but the device was moved somewhere other than home.
//!
//! Transitions are pure field computations; the state manager is responsible
//! for persisting the fields and for the paired usage-log effect. `return`
//! closes the device's open `taken` row and writes no new row, so a complete
//! take/return cycle occupies exactly one log entry.
//!
//! `take` does not reject when the actor already holds the device. Enforcing
//! "not the current holder" is the caller's concern; keeping the transition
//! total makes it idempotent under races between household members.

use crate::types::{Device, HOME_LOCATION};

/// Custody classification of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustodyState {
    Home,
    Out { user_id: String, location: String },
    Placed { location: String },
}

impl CustodyState {
    pub fn of(device: &Device) -> Self {
        match (&device.current_user_id, device.current_location.as_str()) {
            (Some(user_id), location) => CustodyState::Out {
                user_id: user_id.clone(),
                location: location.to_string(),
            },
            (None, HOME_LOCATION) => CustodyState::Home,
            (None, location) => CustodyState::Placed {
                location: location.to_string(),
            },
        }
    }
}

/// The custody columns written by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyFields {
    pub current_user_id: Option<String>,
    pub current_location: String,
}

impl CustodyFields {
    pub fn apply_to(&self, device: &mut Device) {
        device.current_user_id = self.current_user_id.clone();
        device.current_location = self.current_location.clone();
    }
}

/// `take(actor, location)`: the actor now holds the device at `location`.
pub fn take(user_id: &str, location: &str) -> CustodyFields {
    CustodyFields {
        current_user_id: Some(user_id.to_string()),
        current_location: location.to_string(),
    }
}

/// `return`: the device goes back to home base with no holder.
pub fn return_home() -> CustodyFields {
    CustodyFields {
        current_user_id: None,
        current_location: HOME_LOCATION.to_string(),
    }
}

/// `move(location)`: relocates the device, preserving whoever holds it.
pub fn move_to(device: &Device, location: &str) -> CustodyFields {
    CustodyFields {
        current_user_id: device.current_user_id.clone(),
        current_location: location.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_devices;

    fn device() -> Device {
        seed_devices().remove(0)
    }

    #[test]
    fn test_classify_home() {
        assert_eq!(CustodyState::of(&device()), CustodyState::Home);
    }

    #[test]
    fn test_classify_out() {
        let mut d = device();
        take("u1", "office").apply_to(&mut d);
        assert_eq!(
            CustodyState::of(&d),
            CustodyState::Out {
                user_id: "u1".to_string(),
                location: "office".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_placed() {
        let mut d = device();
        move_to(&d, "workshop").apply_to(&mut d);
        assert_eq!(
            CustodyState::of(&d),
            CustodyState::Placed {
                location: "workshop".to_string(),
            }
        );
    }

    #[test]
    fn test_take_then_return_restores_home() {
        let mut d = device();
        take("u1", "office").apply_to(&mut d);
        return_home().apply_to(&mut d);
        assert_eq!(CustodyState::of(&d), CustodyState::Home);
    }

    #[test]
    fn test_move_preserves_holder() {
        let mut d = device();
        take("u1", "office").apply_to(&mut d);
        move_to(&d, "garage").apply_to(&mut d);

        assert_eq!(d.current_user_id.as_deref(), Some("u1"));
        assert_eq!(d.current_location, "garage");
    }

    #[test]
    fn test_move_from_home_places_device() {
        let mut d = device();
        move_to(&d, "basement").apply_to(&mut d);
        assert_eq!(
            CustodyState::of(&d),
            CustodyState::Placed {
                location: "basement".to_string(),
            }
        );
    }

    #[test]
    fn test_take_from_placed() {
        let mut d = device();
        move_to(&d, "basement").apply_to(&mut d);
        take("u2", "office").apply_to(&mut d);
        assert_eq!(
            CustodyState::of(&d),
            CustodyState::Out {
                user_id: "u2".to_string(),
                location: "office".to_string(),
            }
        );
    }
}
