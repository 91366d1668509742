//! editlock Client - Rust SDK for the edit lock service
//!
//! This crate provides:
//! - `LockHttpClient`: one-shot HTTP calls against the lock API
//! - `LockApi`: the trait the controller drives, implemented by the HTTP client
//! - `LockController`: one editing session on one resource, with heartbeats,
//!   status polling, loss detection and release on teardown
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use editlock_client::{ControllerConfig, HttpClientConfig, LockApi, LockController, LockHttpClient};
//! use editlock_common::{LockKey, ResourceType};
//!
//! let client = Arc::new(LockHttpClient::new(HttpClientConfig::new("http://127.0.0.1:8080"))?);
//! let config = ControllerConfig::from(client.settings().await?);
//! let controller = LockController::new(
//!     client,
//!     LockKey::new(ResourceType::Project, "42"),
//!     "u-7",
//!     "Dana",
//!     config,
//! );
//! controller.mount().await;
//! if controller.acquire().await? {
//!     // edit ...
//!     controller.release().await?;
//! }
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;

pub use api::LockApi;
pub use config::ControllerConfig;
pub use controller::{LockController, LockListener, LockState, NoopListener};
pub use error::{ClientError, Result};
pub use http::{HttpClientConfig, LockHttpClient};
