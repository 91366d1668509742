//! editlock Common - Shared types, error codes, and validation
//!
//! This crate provides the foundational types used across all editlock components:
//! - Error taxonomy and error codes
//! - The closed set of lockable resource types
//! - Request field validation

pub mod error;
pub mod resource;
pub mod validation;

// Re-exports for convenience
pub use error::{ErrorCode, LockError};
pub use resource::{LockKey, ResourceType};

/// Query / body parameter names
pub const RESOURCE_TYPE: &str = "resourceType";
pub const RESOURCE_ID: &str = "resourceId";
pub const OWNER_ID: &str = "ownerId";
pub const OWNER_NAME: &str = "ownerName";
pub const CALLER_ID: &str = "callerId";
pub const TOKEN: &str = "token";
