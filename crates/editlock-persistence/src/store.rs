// Database lock store
// Every write primitive is one guarded SQL statement; the composite primary key
// on (resource_type, resource_id) arbitrates concurrent grants.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, QueryOrder, Schema, SqlErr, prelude::Expr,
};
use tracing::{debug, info};

use editlock_common::{LockError, LockKey, ResourceType};
use editlock_core::model::LockRecord;
use editlock_core::store::{DeleteGuard, InsertOutcome, LockStore};

use crate::entity::resource_lock;

/// Rounds of delete-expired / insert before giving up on a flapping row
const MAX_INSERT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct DbLockStore {
    db: DatabaseConnection,
}

impl DbLockStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open a pooled connection to `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, LockError> {
        let mut opt = ConnectOptions::new(url.to_string());
        opt.max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(30))
            .acquire_timeout(Duration::from_secs(8))
            .sqlx_logging(false);

        info!(max_connections, "Connecting lock store database");
        let db = Database::connect(opt).await.map_err(store_error)?;
        Ok(Self::new(db))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create the `resource_lock` table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), LockError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let mut table = schema.create_table_from_entity(resource_lock::Entity);
        table.if_not_exists();

        self.db
            .execute(backend.build(&table))
            .await
            .map_err(store_error)?;
        debug!("resource_lock schema ensured");
        Ok(())
    }

    async fn find(&self, key: &LockKey) -> Result<Option<resource_lock::Model>, LockError> {
        resource_lock::Entity::find_by_id((
            key.resource_type.as_str().to_string(),
            key.resource_id.clone(),
        ))
        .one(&self.db)
        .await
        .map_err(store_error)
    }
}

#[async_trait]
impl LockStore for DbLockStore {
    async fn insert_if_absent_or_expired(
        &self,
        candidate: LockRecord,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, LockError> {
        let now_ms = now.timestamp_millis();
        let key = candidate.key.clone();

        for _ in 0..MAX_INSERT_ATTEMPTS {
            // Clear an expired row so the insert below can claim the key
            resource_lock::Entity::delete_many()
                .filter(key_filter(&key))
                .filter(resource_lock::Column::ExpiresAt.lt(now_ms))
                .exec(&self.db)
                .await
                .map_err(store_error)?;

            let active = resource_lock::ActiveModel {
                resource_type: Set(key.resource_type.as_str().to_string()),
                resource_id: Set(key.resource_id.clone()),
                owner_id: Set(candidate.owner_id.clone()),
                owner_name: Set(candidate.owner_name.clone()),
                token: Set(candidate.token.clone()),
                acquired_at: Set(candidate.acquired_at.timestamp_millis()),
                last_heartbeat_at: Set(candidate.last_heartbeat_at.timestamp_millis()),
                expires_at: Set(candidate.expires_at.timestamp_millis()),
            };

            match resource_lock::Entity::insert(active)
                .exec_without_returning(&self.db)
                .await
            {
                Ok(_) => return Ok(InsertOutcome::Inserted(candidate)),
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    if let Some(model) = self.find(&key).await? {
                        let current = to_record(model)?;
                        if current.is_valid_at(now) {
                            return Ok(InsertOutcome::Held(current));
                        }
                    }
                    debug!(key = %key, "Lock row changed during insert, retrying");
                }
                Err(err) => return Err(store_error(err)),
            }
        }

        Err(LockError::transient(format!(
            "lock row for {} kept changing during insert",
            key
        )))
    }

    async fn update_if_token_matches(
        &self,
        key: &LockKey,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, LockError> {
        let Some(model) = self.find(key).await? else {
            return Ok(None);
        };
        if model.token != token {
            return Ok(None);
        }

        let now_ms = now.timestamp_millis();
        let expires_ms = expires_at.timestamp_millis();
        let result = resource_lock::Entity::update_many()
            .filter(key_filter(key))
            .filter(resource_lock::Column::Token.eq(token))
            .filter(resource_lock::Column::ExpiresAt.gte(now_ms))
            .col_expr(resource_lock::Column::LastHeartbeatAt, Expr::value(now_ms))
            .col_expr(resource_lock::Column::ExpiresAt, Expr::value(expires_ms))
            .exec(&self.db)
            .await
            .map_err(store_error)?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        let mut record = to_record(model)?;
        record.last_heartbeat_at = from_millis(now_ms)?;
        record.expires_at = from_millis(expires_ms)?;
        Ok(Some(record))
    }

    async fn delete_if_token_matches(
        &self,
        key: &LockKey,
        token: &str,
        guard: DeleteGuard,
    ) -> Result<bool, LockError> {
        let expiry = match guard {
            DeleteGuard::Live(now) => resource_lock::Column::ExpiresAt.gte(now.timestamp_millis()),
            DeleteGuard::Expired(now) => resource_lock::Column::ExpiresAt.lt(now.timestamp_millis()),
        };

        let result = resource_lock::Entity::delete_many()
            .filter(key_filter(key))
            .filter(resource_lock::Column::Token.eq(token))
            .filter(expiry)
            .exec(&self.db)
            .await
            .map_err(store_error)?;

        Ok(result.rows_affected > 0)
    }

    async fn get(&self, key: &LockKey) -> Result<Option<LockRecord>, LockError> {
        self.find(key).await?.map(to_record).transpose()
    }

    async fn list(&self) -> Result<Vec<LockRecord>, LockError> {
        resource_lock::Entity::find()
            .order_by_asc(resource_lock::Column::ResourceType)
            .order_by_asc(resource_lock::Column::ResourceId)
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(to_record)
            .collect()
    }

    fn backend(&self) -> &'static str {
        "database"
    }

    async fn health_check(&self) -> Result<(), LockError> {
        self.db.ping().await.map_err(store_error)
    }
}

fn key_filter(key: &LockKey) -> sea_orm::Condition {
    sea_orm::Condition::all()
        .add(resource_lock::Column::ResourceType.eq(key.resource_type.as_str()))
        .add(resource_lock::Column::ResourceId.eq(key.resource_id.as_str()))
}

fn to_record(model: resource_lock::Model) -> Result<LockRecord, LockError> {
    let resource_type = model
        .resource_type
        .parse::<ResourceType>()
        .map_err(|_| LockError::Internal(format!("unknown resource_type row '{}'", model.resource_type)))?;

    Ok(LockRecord {
        key: LockKey::new(resource_type, model.resource_id),
        owner_id: model.owner_id,
        owner_name: model.owner_name,
        token: model.token,
        acquired_at: from_millis(model.acquired_at)?,
        last_heartbeat_at: from_millis(model.last_heartbeat_at)?,
        expires_at: from_millis(model.expires_at)?,
    })
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, LockError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| LockError::Internal(format!("timestamp out of range: {}", ms)))
}

/// Connectivity and statement failures are transient; the caller retries on
/// its next tick. Anything else is a bug or a corrupted row.
fn store_error(err: DbErr) -> LockError {
    match err {
        e @ (DbErr::Conn(_) | DbErr::ConnectionAcquire(_) | DbErr::Exec(_) | DbErr::Query(_)) => {
            LockError::transient(e.to_string())
        }
        other => LockError::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use editlock_core::{LockManager, LockSettings, ManualClock, AcquireOutcome};
    use std::sync::Arc;

    async fn sqlite_store() -> DbLockStore {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        let store = DbLockStore::new(db);
        store.ensure_schema().await.unwrap();
        store
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn key() -> LockKey {
        LockKey::new(ResourceType::TimeEntry, "te-42")
    }

    fn record(owner: &str, now: DateTime<Utc>) -> LockRecord {
        LockRecord::grant(key(), owner, owner, now, chrono::Duration::seconds(90))
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let store = sqlite_store().await;
        store.ensure_schema().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_held_and_replace_expired() {
        let store = sqlite_store().await;
        let first = record("x", t0());
        assert!(matches!(
            store.insert_if_absent_or_expired(first.clone(), t0()).await.unwrap(),
            InsertOutcome::Inserted(_)
        ));

        let at = t0() + chrono::Duration::seconds(90);
        match store.insert_if_absent_or_expired(record("y", at), at).await.unwrap() {
            InsertOutcome::Held(current) => {
                assert_eq!(current.owner_id, "x");
                assert_eq!(current.token, first.token);
                assert_eq!(current.expires_at, first.expires_at);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let at = t0() + chrono::Duration::seconds(91);
        assert!(matches!(
            store.insert_if_absent_or_expired(record("y", at), at).await.unwrap(),
            InsertOutcome::Inserted(ref r) if r.owner_id == "y"
        ));
        let stored = store.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].owner_id, "y");
    }

    #[tokio::test]
    async fn test_update_and_delete_guards() {
        let store = sqlite_store().await;
        let granted = record("x", t0());
        let token = granted.token.clone();
        store.insert_if_absent_or_expired(granted, t0()).await.unwrap();

        let at = t0() + chrono::Duration::seconds(30);
        let new_expiry = at + chrono::Duration::seconds(90);
        assert!(
            store
                .update_if_token_matches(&key(), "nope", at, new_expiry)
                .await
                .unwrap()
                .is_none()
        );
        let renewed = store
            .update_if_token_matches(&key(), &token, at, new_expiry)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renewed.expires_at, new_expiry);
        assert_eq!(renewed.last_heartbeat_at, at);
        assert_eq!(store.get(&key()).await.unwrap().unwrap().expires_at, new_expiry);

        let late = new_expiry + chrono::Duration::seconds(1);
        assert!(
            !store
                .delete_if_token_matches(&key(), &token, DeleteGuard::Live(late))
                .await
                .unwrap()
        );
        assert!(
            !store
                .delete_if_token_matches(&key(), &token, DeleteGuard::Expired(at))
                .await
                .unwrap()
        );
        assert!(
            store
                .delete_if_token_matches(&key(), &token, DeleteGuard::Live(at))
                .await
                .unwrap()
        );
        assert!(store.get(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_manager_over_database_store() {
        let store = Arc::new(sqlite_store().await);
        let clock = Arc::new(ManualClock::new(t0()));
        let manager = LockManager::with_clock(store.clone(), LockSettings::default(), clock.clone());

        let granted = manager.acquire(&key(), "x", "Xavier").await.unwrap();
        let token = granted.token().unwrap().to_string();

        let again = manager.acquire(&key(), "x", "Xavier").await.unwrap();
        assert_eq!(again.token(), Some(token.as_str()));

        match manager.acquire(&key(), "y", "Yvonne").await.unwrap() {
            AcquireOutcome::Denied { holder } => assert_eq!(holder.owner_name, "Xavier"),
            other => panic!("unexpected outcome: {:?}", other),
        }

        clock.advance(std::time::Duration::from_secs(91));
        let taken = manager.acquire(&key(), "y", "Yvonne").await.unwrap();
        assert!(taken.is_granted());
        assert!(!manager.renew(&key(), &token).await.unwrap().is_renewed());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_grant_once() {
        let store = Arc::new(sqlite_store().await);
        let attempts = (0..16).map(|i| {
            let store = store.clone();
            async move {
                store
                    .insert_if_absent_or_expired(record(&format!("owner-{}", i), t0()), t0())
                    .await
                    .unwrap()
            }
        });

        let outcomes = futures::future::join_all(attempts).await;
        let inserted = outcomes
            .iter()
            .filter(|o| matches!(o, InsertOutcome::Inserted(_)))
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
