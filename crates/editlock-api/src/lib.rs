//! editlock API - JSON wire models
//!
//! Shared by the HTTP surface (`editlock-server`) and the SDK
//! (`editlock-client`). Field names are camelCase; absent optionals are
//! omitted from the JSON.

pub mod model;

pub use model::*;

/// Route paths
pub const LOCKS_PATH: &str = "/locks";
pub const ACQUIRE_PATH: &str = "/locks/acquire";
pub const RENEW_PATH: &str = "/locks/renew";
pub const RELEASE_PATH: &str = "/locks/release";
pub const STATUS_PATH: &str = "/locks/status";
pub const SETTINGS_PATH: &str = "/locks/settings";
pub const HEALTH_PATH: &str = "/health";
