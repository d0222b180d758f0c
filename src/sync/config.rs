//! Sync session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CreativeError, CreativeResult};

/// Tuning for a sync session. Every field has a default, so hosts may supply
/// partial JSON such as `{"flush_interval_ms": 250}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Persistence tick. Edits made between ticks are coalesced into one write.
    pub flush_interval_ms: u64,
    /// Delay before each retry of a failed write. Once exhausted the session
    /// reports the failure and keeps the edits pending.
    pub retry_delays_ms: Vec<u64>,
    /// Drop remote snapshots that decode to the local state, such as the echo
    /// of our own write. Stale snapshots are dropped regardless.
    pub echo_suppression: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 500,
            retry_delays_ms: vec![100, 200, 400],
            echo_suppression: true,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> CreativeResult<Self> {
        let config: SyncConfig = serde_json::from_str(json)?;
        if config.flush_interval_ms == 0 {
            return Err(CreativeError::serialization(
                "flush_interval_ms must be greater than zero",
            ));
        }
        Ok(config)
    }

    /// Builder: Set the persistence tick (clamped to at least 1ms).
    pub fn with_flush_interval_ms(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms.max(1);
        self
    }

    /// Builder: Set the retry schedule.
    pub fn with_retry_delays_ms(mut self, delays: Vec<u64>) -> Self {
        self.retry_delays_ms = delays;
        self
    }

    /// Builder: Enable or disable echo suppression.
    pub fn with_echo_suppression(mut self, enabled: bool) -> Self {
        self.echo_suppression = enabled;
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    /// Delay before retry number `attempt` (0-based), or `None` when exhausted.
    pub fn retry_delay(&self, attempt: usize) -> Option<Duration> {
        self.retry_delays_ms
            .get(attempt)
            .map(|ms| Duration::from_millis(*ms))
    }
}
