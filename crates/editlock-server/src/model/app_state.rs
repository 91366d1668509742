//! Shared state handed to every HTTP worker

use chrono::{DateTime, Utc};

use editlock_api::LockSettingsView;
use editlock_core::LockManager;

pub struct AppState {
    pub lock_manager: LockManager,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(lock_manager: LockManager) -> Self {
        Self {
            lock_manager,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    /// Cadence published to clients via GET /locks/settings
    pub fn settings_view(&self) -> LockSettingsView {
        let settings = self.lock_manager.settings();
        LockSettingsView {
            heartbeat_interval_seconds: settings.heartbeat_interval.as_secs(),
            status_poll_interval_seconds: settings.status_poll_interval.as_secs(),
            ttl_seconds: settings.ttl.as_secs(),
            auto_acquire_on_mount: settings.auto_acquire_on_mount,
            auto_release_on_teardown: settings.auto_release_on_teardown,
        }
    }
}
