//! editlock Core - lease-based edit locks
//!
//! This crate provides:
//! - `LockRecord` and the operation outcomes (`AcquireOutcome`, `RenewOutcome`, ...)
//! - The `LockStore` abstraction with its three guarded write primitives
//! - `MemoryLockStore`, a DashMap-backed store for single-instance deployments and tests
//! - `LockManager`, the only writer of the store
//! - `ExpirySweeper`, an optional background task that reclaims expired rows
//! - `LockSettings` (TTL / heartbeat / poll cadence) and the `Clock` seam

pub mod clock;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod settings;
pub mod store;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::LockManager;
pub use model::{
    AcquireOutcome, LockOwner, LockRecord, LockStatus, ReleaseOutcome, RenewOutcome,
};
pub use settings::LockSettings;
pub use store::{DeleteGuard, InsertOutcome, LockStore, MemoryLockStore};
pub use sweeper::ExpirySweeper;

pub use editlock_common::{LockError, LockKey, ResourceType};
