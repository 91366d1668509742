// In-memory lock store
// Each primitive runs under the DashMap shard lock of its key

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use editlock_common::{LockError, LockKey};

use super::{DeleteGuard, InsertOutcome, LockStore};
use crate::model::LockRecord;

/// DashMap-backed store for single-instance deployments and tests
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    pub(crate) locks: Arc<DashMap<LockKey, LockRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn insert_if_absent_or_expired(
        &self,
        candidate: LockRecord,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, LockError> {
        // The entry guard holds the shard write lock for the whole check-and-set
        match self.locks.entry(candidate.key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_valid_at(now) {
                    return Ok(InsertOutcome::Held(occupied.get().clone()));
                }
                let previous = occupied.insert(candidate.clone());
                debug!(
                    key = %candidate.key,
                    previous_owner = %previous.owner_id,
                    "Replaced expired lock record"
                );
                Ok(InsertOutcome::Inserted(candidate))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(candidate.clone());
                Ok(InsertOutcome::Inserted(candidate))
            }
        }
    }

    async fn update_if_token_matches(
        &self,
        key: &LockKey,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, LockError> {
        let Some(mut record) = self.locks.get_mut(key) else {
            return Ok(None);
        };
        if record.token != token || record.is_expired_at(now) {
            return Ok(None);
        }
        record.last_heartbeat_at = now;
        record.expires_at = expires_at;
        Ok(Some(record.clone()))
    }

    async fn delete_if_token_matches(
        &self,
        key: &LockKey,
        token: &str,
        guard: DeleteGuard,
    ) -> Result<bool, LockError> {
        let removed = self
            .locks
            .remove_if(key, |_, record| record.token == token && guard.admits(record));
        Ok(removed.is_some())
    }

    async fn get(&self, key: &LockKey) -> Result<Option<LockRecord>, LockError> {
        Ok(self.locks.get(key).map(|r| r.clone()))
    }

    async fn list(&self) -> Result<Vec<LockRecord>, LockError> {
        Ok(self.locks.iter().map(|entry| entry.value().clone()).collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use editlock_common::ResourceType;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn key() -> LockKey {
        LockKey::new(ResourceType::Project, "p1")
    }

    fn record(owner: &str, now: DateTime<Utc>) -> LockRecord {
        LockRecord::grant(key(), owner, owner, now, chrono::Duration::seconds(90))
    }

    #[tokio::test]
    async fn test_insert_into_empty_slot() {
        let store = MemoryLockStore::new();
        let outcome = store
            .insert_if_absent_or_expired(record("x", t0()), t0())
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(ref r) if r.owner_id == "x"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_blocked_by_valid_record() {
        let store = MemoryLockStore::new();
        store
            .insert_if_absent_or_expired(record("x", t0()), t0())
            .await
            .unwrap();

        let later = t0() + chrono::Duration::seconds(30);
        let outcome = store
            .insert_if_absent_or_expired(record("y", later), later)
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Held(ref r) if r.owner_id == "x"));
    }

    #[tokio::test]
    async fn test_insert_replaces_expired_record() {
        let store = MemoryLockStore::new();
        store
            .insert_if_absent_or_expired(record("x", t0()), t0())
            .await
            .unwrap();

        let later = t0() + chrono::Duration::seconds(91);
        let outcome = store
            .insert_if_absent_or_expired(record("y", later), later)
            .await
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(ref r) if r.owner_id == "y"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_requires_matching_token_and_validity() {
        let store = MemoryLockStore::new();
        let granted = record("x", t0());
        let token = granted.token.clone();
        store.insert_if_absent_or_expired(granted, t0()).await.unwrap();

        let at = t0() + chrono::Duration::seconds(30);
        let new_expiry = at + chrono::Duration::seconds(90);
        assert!(
            store
                .update_if_token_matches(&key(), "wrong", at, new_expiry)
                .await
                .unwrap()
                .is_none()
        );

        let updated = store
            .update_if_token_matches(&key(), &token, at, new_expiry)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.expires_at, new_expiry);
        assert_eq!(updated.last_heartbeat_at, at);
        assert_eq!(updated.token, token);

        let too_late = new_expiry + chrono::Duration::seconds(1);
        assert!(
            store
                .update_if_token_matches(&key(), &token, too_late, too_late)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_guards() {
        let store = MemoryLockStore::new();
        let granted = record("x", t0());
        let token = granted.token.clone();
        store.insert_if_absent_or_expired(granted, t0()).await.unwrap();

        // Sweeper guard leaves a live record alone
        assert!(
            !store
                .delete_if_token_matches(&key(), &token, DeleteGuard::Expired(t0()))
                .await
                .unwrap()
        );

        // Release guard leaves an expired record alone
        let expired_at = t0() + chrono::Duration::seconds(120);
        assert!(
            !store
                .delete_if_token_matches(&key(), &token, DeleteGuard::Live(expired_at))
                .await
                .unwrap()
        );

        assert!(
            !store
                .delete_if_token_matches(&key(), "other", DeleteGuard::Expired(expired_at))
                .await
                .unwrap()
        );
        assert!(
            store
                .delete_if_token_matches(&key(), &token, DeleteGuard::Expired(expired_at))
                .await
                .unwrap()
        );
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_grant_once() {
        let store = MemoryLockStore::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let candidate = record(&format!("owner-{}", i), t0());
                store.insert_if_absent_or_expired(candidate, t0()).await
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if let InsertOutcome::Inserted(_) = handle.await.unwrap().unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }
}
