use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic drain attempts.
    pub drain_interval_secs: u64,
    /// Failed attempts after which an item is dropped.
    pub max_retries: u32,
    /// Capacity of the engine's command channel.
    pub command_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: 30,
            max_retries: 3,
            command_buffer: 64,
        }
    }
}

impl SyncConfig {
    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs.max(1))
    }
}
