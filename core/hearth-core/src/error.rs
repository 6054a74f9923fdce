//! Error types for hearth-core operations.
//!
//! Errors are returned to the caller as typed values; nothing in the core
//! retries or hides a failure behind a recovery path. Loading failures are
//! the one exception: they degrade to defaults and are logged instead.

/// All errors that can occur in hearth-core operations.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    // ─────────────────────────────────────────────────────────────────────
    // Access Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No household: create or join a household first")]
    NoHousehold,

    #[error("Remote store not configured")]
    NotConfigured,

    // ─────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Remote store failure: {0}")]
    RemoteFailure(String),

    #[error("Usage log unavailable in the current mode")]
    LogUnavailable,

    // ─────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Assistant not configured")]
    AssistantUnavailable,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HearthError {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        HearthError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results using HearthError.
pub type Result<T> = std::result::Result<T, HearthError>;

// Conversion for string error compatibility
impl From<HearthError> for String {
    fn from(err: HearthError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = HearthError::validation("compartments", "must be between 1 and 100");
        assert_eq!(err.to_string(), "Invalid compartments: must be between 1 and 100");
    }

    #[test]
    fn test_remote_failure_carries_message() {
        let err = HearthError::RemoteFailure("disk I/O error".to_string());
        assert!(err.to_string().contains("disk I/O error"));
    }
}
