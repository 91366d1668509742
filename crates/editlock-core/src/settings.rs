//! Lease timing settings
//!
//! The TTL must cover several heartbeat intervals so that a single missed
//! beat (network jitter, a slow tick) never expires a lock that is still in
//! use. `validate` rejects anything tighter than `MIN_TTL_HEARTBEAT_RATIO`.

use std::time::Duration;

use tracing::warn;

use editlock_common::LockError;

pub const DEFAULT_TTL_SECONDS: u64 = 90;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECONDS: u64 = 30;
pub const DEFAULT_STATUS_POLL_INTERVAL_SECONDS: u64 = 15;

/// Hard lower bound on `ttl / heartbeat_interval`
pub const MIN_TTL_HEARTBEAT_RATIO: u64 = 2;

/// Ratio below which a warning is logged
pub const RECOMMENDED_TTL_HEARTBEAT_RATIO: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockSettings {
    pub ttl: Duration,
    pub heartbeat_interval: Duration,
    pub status_poll_interval: Duration,
    pub auto_acquire_on_mount: bool,
    pub auto_release_on_teardown: bool,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECONDS),
            status_poll_interval: Duration::from_secs(DEFAULT_STATUS_POLL_INTERVAL_SECONDS),
            auto_acquire_on_mount: false,
            auto_release_on_teardown: true,
        }
    }
}

impl LockSettings {
    pub fn from_seconds(ttl: u64, heartbeat_interval: u64, status_poll_interval: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl),
            heartbeat_interval: Duration::from_secs(heartbeat_interval),
            status_poll_interval: Duration::from_secs(status_poll_interval),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_auto_acquire_on_mount(mut self, enabled: bool) -> Self {
        self.auto_acquire_on_mount = enabled;
        self
    }

    pub fn with_auto_release_on_teardown(mut self, enabled: bool) -> Self {
        self.auto_release_on_teardown = enabled;
        self
    }

    pub fn ttl_delta(&self) -> chrono::Duration {
        crate::clock::to_delta(self.ttl)
    }

    /// How many consecutive heartbeats may be missed before the lease lapses
    pub fn tolerated_missed_heartbeats(&self) -> u64 {
        let beat = self.heartbeat_interval.as_millis();
        if beat == 0 {
            return 0;
        }
        ((self.ttl.as_millis() / beat) as u64).saturating_sub(1)
    }

    pub fn validate(&self) -> Result<(), LockError> {
        if self.heartbeat_interval.is_zero() {
            return Err(LockError::Configuration(
                "heartbeatIntervalSeconds must be greater than zero".to_string(),
            ));
        }
        if self.status_poll_interval.is_zero() {
            return Err(LockError::Configuration(
                "statusPollIntervalSeconds must be greater than zero".to_string(),
            ));
        }
        if self.ttl < self.heartbeat_interval * MIN_TTL_HEARTBEAT_RATIO as u32 {
            return Err(LockError::Configuration(format!(
                "ttlSeconds ({}) must be at least {}x heartbeatIntervalSeconds ({})",
                self.ttl.as_secs(),
                MIN_TTL_HEARTBEAT_RATIO,
                self.heartbeat_interval.as_secs()
            )));
        }
        if self.ttl < self.heartbeat_interval * RECOMMENDED_TTL_HEARTBEAT_RATIO as u32 {
            warn!(
                ttl_secs = self.ttl.as_secs(),
                heartbeat_secs = self.heartbeat_interval.as_secs(),
                "TTL tolerates fewer than {} missed heartbeats; expect spurious lock loss under jitter",
                RECOMMENDED_TTL_HEARTBEAT_RATIO - 1
            );
        }
        Ok(())
    }
}
