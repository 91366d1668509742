//! editlock Persistence - database-backed lock store
//!
//! This crate provides:
//! - The `resource_lock` SeaORM entity
//! - `DbLockStore`, a `LockStore` whose guarded primitives are single
//!   conditional SQL statements, for deployments with several server instances

pub mod entity;
pub mod store;

// Re-export sea-orm for convenience
pub use sea_orm;

pub use entity::prelude::*;
pub use store::DbLockStore;
