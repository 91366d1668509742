pub use super::resource_lock::Entity as ResourceLock;
