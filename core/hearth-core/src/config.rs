//! Environment configuration.
//!
//! Two variables select remote mode: the shared-store URL and an anonymous
//! key. Absence of either forces local mode regardless of connectivity. A
//! third variable enables the hosted assistant.

use std::env;

pub const SYNC_URL_VAR: &str = "HEARTH_SYNC_URL";
pub const SYNC_KEY_VAR: &str = "HEARTH_SYNC_KEY";
pub const ASSISTANT_KEY_VAR: &str = "HEARTH_ASSISTANT_KEY";

/// Snapshot of the environment variables the core cares about.
///
/// Production code uses [`EnvConfig::from_env`]; tests construct the struct
/// directly to avoid mutating process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub sync_url: Option<String>,
    pub sync_key: Option<String>,
    pub assistant_key: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        EnvConfig {
            sync_url: non_empty(env::var(SYNC_URL_VAR).ok()),
            sync_key: non_empty(env::var(SYNC_KEY_VAR).ok()),
            assistant_key: non_empty(env::var(ASSISTANT_KEY_VAR).ok()),
        }
    }

    /// True when both remote variables are present.
    pub fn remote_configured(&self) -> bool {
        self.sync_url.is_some() && self.sync_key.is_some()
    }

    pub fn assistant_configured(&self) -> bool {
        self.assistant_key.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_not_remote_configured() {
        let config = EnvConfig::default();
        assert!(!config.remote_configured());
        assert!(!config.assistant_configured());
    }

    #[test]
    fn test_both_variables_required_for_remote() {
        let config = EnvConfig {
            sync_url: Some("file:/tmp/hearth.db".to_string()),
            sync_key: None,
            assistant_key: None,
        };
        assert!(!config.remote_configured());

        let config = EnvConfig {
            sync_key: Some("anon".to_string()),
            ..config
        };
        assert!(config.remote_configured());
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some("anon".to_string())), Some("anon".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
