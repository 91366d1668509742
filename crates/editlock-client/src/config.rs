//! Controller cadence

use std::time::Duration;

use editlock_api::LockSettingsView;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_MISSED_HEARTBEATS: u32 = 3;

/// Floor applied to both timer periods
pub const MIN_TIMER_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub heartbeat_interval: Duration,
    pub status_poll_interval: Duration,
    pub auto_acquire_on_mount: bool,
    pub auto_release_on_teardown: bool,
    /// Consecutive failed heartbeats after which the lock is given up
    pub max_missed_heartbeats: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            status_poll_interval: DEFAULT_STATUS_POLL_INTERVAL,
            auto_acquire_on_mount: false,
            auto_release_on_teardown: true,
            max_missed_heartbeats: DEFAULT_MAX_MISSED_HEARTBEATS,
        }
    }
}

impl ControllerConfig {
    pub fn with_auto_acquire_on_mount(mut self, enabled: bool) -> Self {
        self.auto_acquire_on_mount = enabled;
        self
    }

    pub fn with_auto_release_on_teardown(mut self, enabled: bool) -> Self {
        self.auto_release_on_teardown = enabled;
        self
    }

    pub fn with_intervals(mut self, heartbeat: Duration, status_poll: Duration) -> Self {
        self.heartbeat_interval = heartbeat;
        self.status_poll_interval = status_poll;
        self
    }
}

/// Adopt the server's cadence. The miss budget is the number of heartbeats
/// that fit in one TTL, i.e. the point where the server has expired the lock.
impl From<LockSettingsView> for ControllerConfig {
    fn from(view: LockSettingsView) -> Self {
        let heartbeat = view.heartbeat_interval_seconds.max(1);
        let max_missed = (view.ttl_seconds / heartbeat).clamp(1, u32::MAX as u64) as u32;
        Self {
            heartbeat_interval: Duration::from_secs(heartbeat),
            status_poll_interval: Duration::from_secs(view.status_poll_interval_seconds.max(1)),
            auto_acquire_on_mount: view.auto_acquire_on_mount,
            auto_release_on_teardown: view.auto_release_on_teardown,
            max_missed_heartbeats: max_missed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_server_settings() {
        let config = ControllerConfig::from(LockSettingsView {
            heartbeat_interval_seconds: 30,
            status_poll_interval_seconds: 15,
            ttl_seconds: 90,
            auto_acquire_on_mount: false,
            auto_release_on_teardown: true,
        });
        assert_eq!(config, ControllerConfig::default());
    }

    #[test]
    fn test_from_long_ttl() {
        let config = ControllerConfig::from(LockSettingsView {
            heartbeat_interval_seconds: 60,
            status_poll_interval_seconds: 0,
            ttl_seconds: 1800,
            auto_acquire_on_mount: true,
            auto_release_on_teardown: false,
        });
        assert_eq!(config.max_missed_heartbeats, 30);
        assert_eq!(config.status_poll_interval, Duration::from_secs(1));
        assert!(config.auto_acquire_on_mount);
        assert!(!config.auto_release_on_teardown);
    }
}
