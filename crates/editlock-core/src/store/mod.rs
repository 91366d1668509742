//! Lock store abstraction
//!
//! The store is the only shared mutable state. Writers go exclusively
//! through the three guarded primitives below, each of which must be a single
//! atomic conditional operation in the backing implementation. Expiry is
//! always evaluated against the `now` passed in by the caller; stores never
//! delete eagerly on their own.

mod memory;

pub use memory::MemoryLockStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use editlock_common::{LockError, LockKey};

use crate::model::LockRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The candidate was stored; no valid record existed.
    Inserted(LockRecord),
    /// A valid record already exists and was left untouched.
    Held(LockRecord),
}

/// Extra condition for `delete_if_token_matches`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteGuard {
    /// Only delete a record that is still valid at the given instant (release)
    Live(DateTime<Utc>),
    /// Only delete a record that is expired at the given instant (sweeper).
    /// A record renewed in the meantime has a later `expires_at` and survives.
    Expired(DateTime<Utc>),
}

impl DeleteGuard {
    pub fn admits(&self, record: &LockRecord) -> bool {
        match *self {
            DeleteGuard::Live(now) => record.is_valid_at(now),
            DeleteGuard::Expired(now) => record.is_expired_at(now),
        }
    }
}

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Store `candidate` unless a record valid at `now` exists for its key.
    async fn insert_if_absent_or_expired(
        &self,
        candidate: LockRecord,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, LockError>;

    /// Extend the record for `key` if it is valid at `now` and carries `token`.
    /// Returns the updated record, or `None` when the precondition failed.
    async fn update_if_token_matches(
        &self,
        key: &LockKey,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, LockError>;

    /// Delete the record for `key` if it carries `token` and satisfies `guard`.
    async fn delete_if_token_matches(
        &self,
        key: &LockKey,
        token: &str,
        guard: DeleteGuard,
    ) -> Result<bool, LockError>;

    /// Raw read; the caller decides validity.
    async fn get(&self, key: &LockKey) -> Result<Option<LockRecord>, LockError>;

    /// Raw listing of every stored record, expired ones included.
    async fn list(&self) -> Result<Vec<LockRecord>, LockError>;

    /// Short name used in logs and health output
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), LockError> {
        Ok(())
    }
}
