//! Sync configuration
//!
//! Settings for event buffering, bulk-read retries and resubscription
//! backoff. Every field has a default, so a partial JSON file is accepted.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for a `RemoteCollectionSync`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Capacity of the change-event channel per subscription
    pub event_buffer: usize,
    /// Extra bulk-read attempts before activation gives up
    pub load_retries: u32,
    /// Re-read the table after resubscribing to pick up missed changes
    pub resync_on_reconnect: bool,
    /// Backoff for resubscription after a dropped stream
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_buffer: 256,
            load_retries: 0,
            resync_on_reconnect: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load from a JSON file, or return defaults if the file is missing or invalid
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_json(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse sync config, using defaults: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read sync config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Set the event buffer capacity
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    /// Set the number of extra bulk-read attempts
    pub fn with_load_retries(mut self, retries: u32) -> Self {
        self.load_retries = retries;
        self
    }

    /// Set the resubscription policy
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Channel capacity, at least one
    pub(crate) fn channel_capacity(&self) -> usize {
        self.event_buffer.max(1)
    }
}

/// Exponential backoff for resubscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on the delay, in milliseconds
    pub max_delay_ms: u64,
    /// Give up after this many attempts (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Retry immediately, without delay
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: None,
        }
    }

    /// Cap the number of attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Delay before the given zero-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let delay = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Check whether another attempt is allowed after `attempts` tries
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.event_buffer, 256);
        assert_eq!(config.load_retries, 0);
        assert!(config.resync_on_reconnect);
        assert_eq!(config.reconnect.initial_delay_ms, 1000);
        assert_eq!(config.reconnect.max_delay_ms, 30_000);
        assert_eq!(config.reconnect.max_attempts, None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            SyncConfig::from_json(r#"{"event_buffer": 8, "reconnect": {"max_attempts": 3}}"#)
                .unwrap();
        assert_eq!(config.event_buffer, 8);
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.reconnect.initial_delay_ms, 1000);
        assert!(config.resync_on_reconnect);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(8000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_max_attempts() {
        let policy = ReconnectPolicy::immediate().with_max_attempts(2);
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
        assert!(ReconnectPolicy::default().allows(1_000));
    }

    #[test]
    fn test_channel_capacity_never_zero() {
        assert_eq!(SyncConfig::default().with_event_buffer(0).channel_capacity(), 1);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.json");
        std::fs::write(&path, r#"{"load_retries": 2}"#).unwrap();
        assert_eq!(SyncConfig::load(&path).load_retries, 2);
    }

    #[test]
    fn test_load_missing_or_invalid_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.json");
        assert_eq!(SyncConfig::load(&missing), SyncConfig::default());

        let invalid = dir.path().join("bad.json");
        std::fs::write(&invalid, "{ not json").unwrap();
        assert_eq!(SyncConfig::load(&invalid), SyncConfig::default());
    }
}
