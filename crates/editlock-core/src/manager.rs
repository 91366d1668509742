// Lock manager
// Acquire/Renew/Release/Status on top of a LockStore; the only writer of the store

use std::sync::Arc;

use tracing::{debug, info, warn};

use editlock_common::{LockError, LockKey};

use crate::clock::{Clock, SystemClock};
use crate::metrics;
use crate::model::{AcquireOutcome, LockRecord, LockStatus, ReleaseOutcome, RenewOutcome};
use crate::settings::LockSettings;
use crate::store::{DeleteGuard, InsertOutcome, LockStore};

/// Bound on conditional-insert retries when a same-owner extension loses a
/// race against expiry or release.
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

/// Lease-based lock manager.
///
/// Every write goes through one of the store's guarded primitives, so the
/// "is it free?" check and the grant are a single atomic step. Expired
/// records are treated as absent on every read.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    settings: LockSettings,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, settings: LockSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn LockStore>,
        settings: LockSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Acquire the lock for `key`, or extend it if `owner_id` already holds it.
    ///
    /// Returns `Denied` with the current holder when another owner has a
    /// valid lock; the store is not modified in that case.
    pub async fn acquire(
        &self,
        key: &LockKey,
        owner_id: &str,
        owner_name: &str,
    ) -> Result<AcquireOutcome, LockError> {
        let ttl = self.settings.ttl_delta();

        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            let now = self.clock.now();
            let candidate = LockRecord::grant(key.clone(), owner_id, owner_name, now, ttl);

            match self.store.insert_if_absent_or_expired(candidate, now).await? {
                InsertOutcome::Inserted(record) => {
                    info!(
                        resource_type = %key.resource_type,
                        resource_id = %key.resource_id,
                        owner_id = %owner_id,
                        expires_at = %record.expires_at,
                        "Lock granted"
                    );
                    metrics::record_acquire("granted");
                    return Ok(AcquireOutcome::Granted {
                        record,
                        reacquired: false,
                    });
                }
                InsertOutcome::Held(current) if current.owner_id == owner_id => {
                    // Same owner (double mount, duplicate call): extend under the
                    // existing token so both callers keep a working proof.
                    if let Some(record) = self
                        .store
                        .update_if_token_matches(key, &current.token, now, now + ttl)
                        .await?
                    {
                        debug!(
                            key = %key,
                            owner_id = %owner_id,
                            "Lock re-acquired by current owner"
                        );
                        metrics::record_acquire("reacquired");
                        return Ok(AcquireOutcome::Granted {
                            record,
                            reacquired: true,
                        });
                    }
                    debug!(
                        key = %key,
                        attempt,
                        "Current-owner extension lost a race, retrying acquire"
                    );
                }
                InsertOutcome::Held(current) => {
                    debug!(
                        key = %key,
                        owner_id = %owner_id,
                        holder = %current.owner_id,
                        "Lock denied, held by another owner"
                    );
                    metrics::record_acquire("denied");
                    return Ok(AcquireOutcome::Denied {
                        holder: current.owner(),
                    });
                }
            }
        }

        warn!(key = %key, owner_id = %owner_id, "Acquire gave up after repeated contention");
        metrics::record_acquire("contended");
        Err(LockError::Internal(format!(
            "acquire for {} did not settle after {} attempts",
            key, MAX_ACQUIRE_ATTEMPTS
        )))
    }

    /// Extend the lease held under `token`.
    ///
    /// `NotOwned` is authoritative: the caller's lock is gone (released,
    /// expired, or superseded by a newer grant).
    pub async fn renew(&self, key: &LockKey, token: &str) -> Result<RenewOutcome, LockError> {
        let now = self.clock.now();
        let expires_at = now + self.settings.ttl_delta();

        match self
            .store
            .update_if_token_matches(key, token, now, expires_at)
            .await?
        {
            Some(record) => {
                debug!(key = %key, expires_at = %record.expires_at, "Lock renewed");
                metrics::record_renew("renewed");
                Ok(RenewOutcome::Renewed {
                    expires_at: record.expires_at,
                })
            }
            None => {
                debug!(key = %key, "Renew rejected, token does not own the lock");
                metrics::record_renew("not_owned");
                Ok(RenewOutcome::NotOwned)
            }
        }
    }

    /// Release the lock held under `token`. Idempotent: a stale, unknown or
    /// expired token is reported as `NotHeld` and nothing is modified.
    pub async fn release(&self, key: &LockKey, token: &str) -> Result<ReleaseOutcome, LockError> {
        let now = self.clock.now();
        let deleted = self
            .store
            .delete_if_token_matches(key, token, DeleteGuard::Live(now))
            .await?;

        if deleted {
            info!(
                resource_type = %key.resource_type,
                resource_id = %key.resource_id,
                "Lock released"
            );
            metrics::record_release("released");
            Ok(ReleaseOutcome::Released)
        } else {
            debug!(key = %key, "Release was a no-op");
            metrics::record_release("not_held");
            Ok(ReleaseOutcome::NotHeld)
        }
    }

    /// Read-only lock status for `key` as seen by `caller_id`.
    pub async fn status(&self, key: &LockKey, caller_id: &str) -> Result<LockStatus, LockError> {
        let now = self.clock.now();
        let record = self
            .store
            .get(key)
            .await?
            .filter(|record| record.is_valid_at(now));

        Ok(match record {
            Some(record) => LockStatus {
                is_own_lock: !caller_id.is_empty() && record.owner_id == caller_id,
                holder: Some(record.owner()),
            },
            None => LockStatus::default(),
        })
    }

    /// Every lock that is valid right now, ordered by key
    pub async fn list_active(&self) -> Result<Vec<LockRecord>, LockError> {
        let now = self.clock.now();
        let mut records: Vec<LockRecord> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|record| record.is_valid_at(now))
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryLockStore;
    use chrono::{TimeZone, Utc};
    use editlock_common::ResourceType;
    use std::time::Duration;

    fn setup() -> (LockManager, Arc<ManualClock>, MemoryLockStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let store = MemoryLockStore::new();
        let manager = LockManager::with_clock(
            Arc::new(store.clone()),
            LockSettings::default(),
            clock.clone(),
        );
        (manager, clock, store)
    }

    fn p1() -> LockKey {
        LockKey::new(ResourceType::Project, "p1")
    }

    fn granted_token(outcome: &AcquireOutcome) -> String {
        outcome.token().expect("expected a grant").to_string()
    }

    #[tokio::test]
    async fn test_acquire_free_resource() {
        let (manager, clock, _) = setup();
        let outcome = manager.acquire(&p1(), "x", "Xavier").await.unwrap();

        match outcome {
            AcquireOutcome::Granted { record, reacquired } => {
                assert!(!reacquired);
                assert_eq!(record.owner_id, "x");
                assert_eq!(record.acquired_at, clock.now());
                assert_eq!(
                    record.expires_at,
                    clock.now() + chrono::Duration::seconds(90)
                );
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reacquire_by_owner_returns_same_token() {
        let (manager, clock, store) = setup();
        let first = manager.acquire(&p1(), "x", "Xavier").await.unwrap();
        let token = granted_token(&first);

        clock.advance(Duration::from_secs(20));
        let second = manager.acquire(&p1(), "x", "Xavier").await.unwrap();

        assert_eq!(granted_token(&second), token);
        assert!(matches!(second, AcquireOutcome::Granted { reacquired: true, .. }));
        assert_eq!(store.len(), 1);

        let status = manager.status(&p1(), "x").await.unwrap();
        assert_eq!(
            status.holder.unwrap().expires_at,
            clock.now() + chrono::Duration::seconds(90)
        );
    }

    #[tokio::test]
    async fn test_denied_acquire_does_not_mutate() {
        let (manager, clock, store) = setup();
        manager.acquire(&p1(), "x", "Xavier").await.unwrap();
        let before = store.list().await.unwrap();

        clock.advance(Duration::from_secs(10));
        let outcome = manager.acquire(&p1(), "y", "Yvonne").await.unwrap();

        match outcome {
            AcquireOutcome::Denied { holder } => {
                assert_eq!(holder.owner_id, "x");
                assert_eq!(holder.owner_name, "Xavier");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_renew_extends_without_changing_token() {
        let (manager, clock, store) = setup();
        let token = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());

        clock.advance(Duration::from_secs(30));
        let outcome = manager.renew(&p1(), &token).await.unwrap();
        assert_eq!(
            outcome,
            RenewOutcome::Renewed {
                expires_at: clock.now() + chrono::Duration::seconds(90)
            }
        );

        let stored = store.get(&p1()).await.unwrap().unwrap();
        assert_eq!(stored.token, token);
        assert_eq!(stored.last_heartbeat_at, clock.now());
    }

    #[tokio::test]
    async fn test_renew_with_unknown_or_superseded_token_is_not_owned() {
        let (manager, clock, _) = setup();
        assert_eq!(
            manager.renew(&p1(), "deadbeef").await.unwrap(),
            RenewOutcome::NotOwned
        );

        let old = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());
        clock.advance(Duration::from_secs(91));
        let new = granted_token(&manager.acquire(&p1(), "y", "Yvonne").await.unwrap());
        assert_ne!(old, new);

        assert_eq!(
            manager.renew(&p1(), &old).await.unwrap(),
            RenewOutcome::NotOwned
        );
        assert_eq!(
            manager.release(&p1(), &old).await.unwrap(),
            ReleaseOutcome::NotHeld
        );
        // The superseding owner is untouched
        assert!(manager.renew(&p1(), &new).await.unwrap().is_renewed());
    }

    #[tokio::test]
    async fn test_renew_after_expiry_is_not_owned() {
        let (manager, clock, _) = setup();
        let token = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());

        clock.advance(Duration::from_secs(91));
        assert_eq!(
            manager.renew(&p1(), &token).await.unwrap(),
            RenewOutcome::NotOwned
        );
    }

    #[tokio::test]
    async fn test_lazy_expiry_without_sweep() {
        let (manager, clock, store) = setup();
        manager.acquire(&p1(), "x", "Xavier").await.unwrap();

        clock.advance(Duration::from_secs(90));
        assert!(manager.status(&p1(), "y").await.unwrap().is_locked());

        clock.advance(Duration::from_secs(1));
        let status = manager.status(&p1(), "y").await.unwrap();
        assert!(!status.is_locked());
        assert!(!status.is_own_lock);
        // Still physically present
        assert_eq!(store.len(), 1);
        assert!(manager.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (manager, clock, store) = setup();
        let token = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());

        assert_eq!(
            manager.release(&p1(), &token).await.unwrap(),
            ReleaseOutcome::Released
        );
        assert_eq!(
            manager.release(&p1(), &token).await.unwrap(),
            ReleaseOutcome::NotHeld
        );

        // Releasing an expired lock performs no mutation
        let token = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());
        clock.advance(Duration::from_secs(120));
        let before = store.list().await.unwrap();
        assert_eq!(
            manager.release(&p1(), &token).await.unwrap(),
            ReleaseOutcome::NotHeld
        );
        assert_eq!(store.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_status_reports_own_lock() {
        let (manager, _, _) = setup();
        manager.acquire(&p1(), "x", "Xavier").await.unwrap();

        let own = manager.status(&p1(), "x").await.unwrap();
        assert!(own.is_locked());
        assert!(own.is_own_lock);

        let anonymous = manager.status(&p1(), "").await.unwrap();
        assert!(anonymous.is_locked());
        assert!(!anonymous.is_own_lock);
    }

    #[tokio::test]
    async fn test_locks_are_scoped_per_resource() {
        let (manager, _, _) = setup();
        assert!(manager.acquire(&p1(), "x", "X").await.unwrap().is_granted());
        let e1 = LockKey::new(ResourceType::Employee, "p1");
        assert!(manager.acquire(&e1, "y", "Y").await.unwrap().is_granted());
        let p2 = LockKey::new(ResourceType::Project, "p2");
        assert!(manager.acquire(&p2, "y", "Y").await.unwrap().is_granted());

        let active = manager.list_active().await.unwrap();
        assert_eq!(active.len(), 3);
        assert_eq!(active[0].key, p1());
    }

    // Scenario A: simultaneous acquire on a free resource yields exactly one grant
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_single_winner() {
        let (manager, _, store) = setup();

        let (x, y) = tokio::join!(
            {
                let m = manager.clone();
                async move { m.acquire(&p1(), "x", "Xavier").await.unwrap() }
            },
            {
                let m = manager.clone();
                async move { m.acquire(&p1(), "y", "Yvonne").await.unwrap() }
            }
        );

        let (winner, loser) = match (&x, &y) {
            (AcquireOutcome::Granted { record, .. }, AcquireOutcome::Denied { holder }) => {
                (record.owner_id.clone(), holder.owner_id.clone())
            }
            (AcquireOutcome::Denied { holder }, AcquireOutcome::Granted { record, .. }) => {
                (record.owner_id.clone(), holder.owner_id.clone())
            }
            other => panic!("expected exactly one grant, got {:?}", other),
        };
        assert_eq!(winner, loser);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_mutual_exclusion_many_contenders() {
        let (manager, _, _) = setup();
        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let m = manager.clone();
                tokio::spawn(async move {
                    m.acquire(&p1(), &format!("owner-{}", i), "").await.unwrap()
                })
            })
            .collect();

        let outcomes = futures::future::join_all(tasks).await;
        let grants = outcomes
            .into_iter()
            .map(|r| r.unwrap())
            .filter(AcquireOutcome::is_granted)
            .count();
        assert_eq!(grants, 1);
        assert_eq!(manager.list_active().await.unwrap().len(), 1);
    }

    // Scenario B: a crashed owner's lock becomes acquirable after TTL
    #[tokio::test]
    async fn test_crashed_owner_lock_self_expires() {
        let (manager, clock, _) = setup();
        let token = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());

        for _ in 0..3 {
            clock.advance(Duration::from_secs(30));
            assert!(manager.renew(&p1(), &token).await.unwrap().is_renewed());
        }
        // X stops heartbeating; last renewal at t=90s, lease ends at t=180s
        clock.advance(Duration::from_secs(89));
        assert!(!manager.acquire(&p1(), "y", "Yvonne").await.unwrap().is_granted());

        clock.advance(Duration::from_secs(2));
        let outcome = manager.acquire(&p1(), "y", "Yvonne").await.unwrap();
        assert!(outcome.is_granted());
        assert_ne!(granted_token(&outcome), token);
    }

    #[tokio::test]
    async fn test_scenario_b_at_91_seconds() {
        let (manager, clock, _) = setup();
        manager.acquire(&p1(), "x", "Xavier").await.unwrap();
        clock.advance(Duration::from_secs(91));
        assert!(manager.acquire(&p1(), "y", "Yvonne").await.unwrap().is_granted());
    }

    // Scenario C: a non-owner sees who holds the lock
    #[tokio::test]
    async fn test_status_for_other_caller() {
        let (manager, _, _) = setup();
        manager.acquire(&p1(), "x", "Xavier").await.unwrap();

        let status = manager.status(&p1(), "y").await.unwrap();
        assert!(status.is_locked());
        assert!(!status.is_own_lock);
        assert_eq!(status.holder.unwrap().owner_id, "x");
    }

    // Scenario D: after release the next grant carries a fresh token
    #[tokio::test]
    async fn test_acquire_after_release_gets_new_token() {
        let (manager, _, _) = setup();
        let x_token = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());
        manager.release(&p1(), &x_token).await.unwrap();

        let outcome = manager.acquire(&p1(), "y", "Yvonne").await.unwrap();
        assert!(outcome.is_granted());
        assert_ne!(granted_token(&outcome), x_token);
    }

    #[tokio::test]
    async fn test_owner_reacquire_after_expiry_mints_new_token() {
        let (manager, clock, _) = setup();
        let first = granted_token(&manager.acquire(&p1(), "x", "Xavier").await.unwrap());
        clock.advance(Duration::from_secs(91));

        let second = manager.acquire(&p1(), "x", "Xavier").await.unwrap();
        assert!(matches!(second, AcquireOutcome::Granted { reacquired: false, .. }));
        assert_ne!(granted_token(&second), first);
    }
}
