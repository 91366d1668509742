//! Controller states and the callbacks a UI hooks into

use std::fmt::{Display, Formatter};

use editlock_api::{LockInfo, StatusResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Idle,
    Acquiring,
    Owned,
    /// Owned, with a renew call outstanding
    Renewing,
    /// The lock was taken away; terminal until the user acquires again
    Lost,
    LockedByOther,
    Releasing,
}

impl LockState {
    /// Whether this session currently believes it holds the lock
    pub fn is_owned(&self) -> bool {
        matches!(self, LockState::Owned | LockState::Renewing)
    }
}

impl Display for LockState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LockState::Idle => "idle",
            LockState::Acquiring => "acquiring",
            LockState::Owned => "owned",
            LockState::Renewing => "renewing",
            LockState::Lost => "lost",
            LockState::LockedByOther => "locked_by_other",
            LockState::Releasing => "releasing",
        };
        f.write_str(name)
    }
}

/// Callbacks fired by `LockController`. Each is invoked outside the
/// controller's internal lock, so a listener may call back into it.
pub trait LockListener: Send + Sync {
    fn on_acquired(&self, _lock: &LockInfo) {}

    fn on_denied(&self, _holder: &LockInfo) {}

    /// Fired exactly once per lost ownership
    fn on_lost(&self) {}

    fn on_released(&self) {}

    fn on_status(&self, _status: &StatusResponse) {}

    fn on_connection_lost(&self) {}

    fn on_connection_restored(&self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl LockListener for NoopListener {}

/// Callback queued while the state lock is held, dispatched after it is released
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Acquired(LockInfo),
    Denied(LockInfo),
    Lost,
    Released,
    Status(StatusResponse),
    ConnectionLost,
    ConnectionRestored,
}

impl Event {
    pub(crate) fn dispatch(&self, listener: &dyn LockListener) {
        match self {
            Event::Acquired(lock) => listener.on_acquired(lock),
            Event::Denied(holder) => listener.on_denied(holder),
            Event::Lost => listener.on_lost(),
            Event::Released => listener.on_released(),
            Event::Status(status) => listener.on_status(status),
            Event::ConnectionLost => listener.on_connection_lost(),
            Event::ConnectionRestored => listener.on_connection_restored(),
        }
    }
}
