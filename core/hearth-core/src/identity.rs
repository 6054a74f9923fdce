//! Actor identity supplied by the authentication collaborator.
//!
//! The core reads identity but does not own it: the embedding client resolves
//! sign-in and household membership and pushes the result into the state
//! manager via [`crate::InventoryManager::set_identity`].

/// The signed-in actor and the household they belong to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub household_id: Option<String>,
}

impl Identity {
    /// An actor without a household (fresh account, local-only usage).
    pub fn new(user_id: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            household_id: None,
        }
    }

    pub fn with_household(user_id: impl Into<String>, household_id: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            household_id: Some(household_id.into()),
        }
    }
}
