//! Lock store selection

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use editlock_core::{LockStore, MemoryLockStore};
use editlock_persistence::DbLockStore;

use crate::model::{Configuration, StoreKind};

/// Build the store named by `lock.store`; the database store gets its table on first start
pub async fn init_lock_store(configuration: &Configuration) -> anyhow::Result<Arc<dyn LockStore>> {
    match configuration.store_kind()? {
        StoreKind::Memory => {
            info!("Using in-memory lock store");
            Ok(Arc::new(MemoryLockStore::new()))
        }
        StoreKind::Database => {
            let url = configuration
                .database_url()
                .context("lock.store=database requires db.url (or --db-url / DATABASE_URL)")?;
            let store = DbLockStore::connect(&url, configuration.db_max_connections()).await?;
            store.ensure_schema().await?;
            info!("Using database lock store");
            Ok(Arc::new(store))
        }
    }
}
