//! Expired lock reclamation
//!
//! Correctness never depends on this task: every read already treats an
//! expired record as absent. The sweeper only keeps the store from growing
//! with rows nobody will touch again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use editlock_common::LockError;

use crate::clock::Clock;
use crate::metrics;
use crate::store::{DeleteGuard, LockStore};

pub struct ExpirySweeper {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            store,
            clock,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Delete every record that is expired as of now. Returns the number removed.
    ///
    /// Each delete is guarded on the token and on expiry at the same instant,
    /// so a record renewed or re-granted after the listing survives.
    pub async fn sweep_once(&self) -> Result<usize, LockError> {
        let now = self.clock.now();
        let mut removed = 0usize;

        for record in self.store.list().await? {
            if !record.is_expired_at(now) {
                continue;
            }
            if self
                .store
                .delete_if_token_matches(&record.key, &record.token, DeleteGuard::Expired(now))
                .await?
            {
                debug!(key = %record.key, owner_id = %record.owner_id, "Swept expired lock");
                removed += 1;
            }
        }

        if removed > 0 {
            metrics::record_swept(removed as u64);
        }
        Ok(removed)
    }

    /// Run `sweep_once` on a fixed interval until `shutdown` fires
    pub fn start(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                backend = self.store.backend(),
                "Starting lock expiry sweeper with interval {:?}", self.interval
            );
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.sweep_once().await {
                            Ok(0) => {}
                            Ok(n) => info!(removed = n, "Lock expiry sweep completed"),
                            Err(e) => warn!(error = %e, "Lock expiry sweep failed"),
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Lock expiry sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::LockRecord;
    use crate::store::{InsertOutcome, MemoryLockStore};
    use crate::{LockManager, LockSettings};
    use chrono::{TimeZone, Utc};
    use editlock_common::{LockKey, ResourceType};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let clock = clock();
        let store = MemoryLockStore::new();
        let manager =
            LockManager::with_clock(Arc::new(store.clone()), LockSettings::default(), clock.clone());
        let sweeper = ExpirySweeper::new(Arc::new(store.clone()), clock.clone(), Duration::from_secs(60));

        let old = LockKey::new(ResourceType::Project, "old");
        manager.acquire(&old, "x", "X").await.unwrap();
        clock.advance(Duration::from_secs(60));
        let fresh = LockKey::new(ResourceType::Project, "fresh");
        manager.acquire(&fresh, "y", "Y").await.unwrap();

        clock.advance(Duration::from_secs(31));
        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&fresh).await.unwrap().is_some());

        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_spares_regranted_record() {
        let clock = clock();
        let store = MemoryLockStore::new();
        let key = LockKey::new(ResourceType::Vacation, "v1");

        let stale = LockRecord::grant(key.clone(), "x", "X", clock.now(), chrono::Duration::seconds(90));
        store.insert_if_absent_or_expired(stale.clone(), clock.now()).await.unwrap();
        clock.advance(Duration::from_secs(100));

        // Someone re-acquires between the sweeper's listing and its delete
        let regrant = LockRecord::grant(key.clone(), "y", "Y", clock.now(), chrono::Duration::seconds(90));
        let outcome = store.insert_if_absent_or_expired(regrant.clone(), clock.now()).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted(_)));

        let deleted = store
            .delete_if_token_matches(&key, &stale.token, DeleteGuard::Expired(clock.now()))
            .await
            .unwrap();
        assert!(!deleted);
        assert_eq!(store.get(&key).await.unwrap().unwrap().token, regrant.token);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_stops_on_shutdown() {
        let clock = clock();
        let store = MemoryLockStore::new();
        let key = LockKey::new(ResourceType::Employee, "e1");
        let record = LockRecord::grant(key, "x", "X", clock.now(), chrono::Duration::seconds(90));
        store.insert_if_absent_or_expired(record, clock.now()).await.unwrap();
        clock.advance(Duration::from_secs(120));

        let sweeper = Arc::new(ExpirySweeper::new(
            Arc::new(store.clone()),
            clock.clone(),
            Duration::from_secs(60),
        ));
        let (tx, rx) = broadcast::channel(1);
        let handle = sweeper.start(rx);

        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
