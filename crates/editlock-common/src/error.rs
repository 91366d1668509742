//! Error types and error codes for editlock
//!
//! This module defines:
//! - `LockError`: failures of lock operations (business outcomes such as a
//!   denied acquire are values, not errors)
//! - `ErrorCode`: structured error codes for API responses

use serde::{Deserialize, Serialize};

/// Lock operation failures
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Malformed resource type, resource id, owner or token; rejected before
    /// the store is touched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The backing store could not be reached. Callers retry on the next tick.
    #[error("lock store unavailable: {0}")]
    TransientIo(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LockError {
    pub fn invalid(message: impl Into<String>) -> Self {
        LockError::InvalidRequest(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        LockError::TransientIo(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, LockError::TransientIo(_))
    }

    /// Error code carried in HTTP error bodies
    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            LockError::InvalidRequest(_) => PARAMETER_VALIDATE_ERROR,
            LockError::TransientIo(_) => LOCK_STORE_UNAVAILABLE,
            LockError::Configuration(_) | LockError::Internal(_) => SERVER_ERROR,
        }
    }
}

/// Error code structure for API responses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const PARAMETER_MISSING: ErrorCode<'static> = ErrorCode {
    code: 10000,
    message: "parameter missing",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const LOCK_STORE_UNAVAILABLE: ErrorCode<'static> = ErrorCode {
    code: 30001,
    message: "lock store unavailable",
};

pub const SERVER_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "server error",
};
