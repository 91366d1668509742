//! Request and response bodies for the lock endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use editlock_common::validation::{
    invalid_field, validate_owner_id, validate_owner_name, validate_token,
};
use editlock_common::{LockError, LockKey};

// ============================================================================
// Requests
// ============================================================================

/// POST /locks/acquire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub owner_name: String,
}

impl AcquireRequest {
    /// Validate every field and return the parsed lock key
    pub fn validate(&self) -> Result<LockKey, LockError> {
        let key = LockKey::parse(&self.resource_type, &self.resource_id)?;
        validate_owner_id(&self.owner_id).map_err(|e| invalid_field("ownerId", e))?;
        validate_owner_name(&self.owner_name).map_err(|e| invalid_field("ownerName", e))?;
        Ok(key)
    }
}

/// POST /locks/renew and POST /locks/release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub token: String,
}

impl TokenRequest {
    /// Validate the lock key. The token is not checked here: an unknown or
    /// malformed token is a not-owned outcome, not a bad request.
    pub fn validate(&self) -> Result<LockKey, LockError> {
        LockKey::parse(&self.resource_type, &self.resource_id)
    }

    /// Whether the token could have been minted by the server at all
    pub fn has_well_formed_token(&self) -> bool {
        validate_token(&self.token).is_ok()
    }
}

pub type RenewRequest = TokenRequest;
pub type ReleaseRequest = TokenRequest;

/// GET /locks/status query string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub caller_id: String,
}

impl StatusQuery {
    pub fn validate(&self) -> Result<LockKey, LockError> {
        LockKey::parse(&self.resource_type, &self.resource_id)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Public view of a lock: who holds it and until when. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub owner_id: String,
    pub owner_name: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireResponse {
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockInfo>,
}

impl AcquireResponse {
    pub fn granted(token: String, lock: LockInfo) -> Self {
        Self {
            granted: true,
            token: Some(token),
            lock: Some(lock),
        }
    }

    pub fn denied(holder: LockInfo) -> Self {
        Self {
            granted: false,
            token: None,
            lock: Some(holder),
        }
    }
}

/// Body of renew and release responses. `ok=false` on renew means the
/// caller no longer holds the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub type RenewResponse = OkResponse;
pub type ReleaseResponse = OkResponse;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockHolder {
    pub owner_id: String,
    pub owner_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub is_locked: bool,
    pub is_own_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<LockHolder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StatusResponse {
    pub fn unlocked() -> Self {
        Self::default()
    }
}

/// One entry of GET /locks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLock {
    pub resource_type: String,
    pub resource_id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub acquired_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// GET /locks/settings: the cadence clients should run their controllers at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSettingsView {
    pub heartbeat_interval_seconds: u64,
    pub status_poll_interval_seconds: u64,
    pub ttl_seconds: u64,
    pub auto_acquire_on_mount: bool,
    pub auto_release_on_teardown: bool,
}

/// GET /health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub uptime_seconds: i64,
}

/// Envelope for failed requests (400/503/500)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub code: i32,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_info() -> LockInfo {
        LockInfo {
            owner_id: "u1".to_string(),
            owner_name: "Ursula".to_string(),
            acquired_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 1, 30).unwrap(),
        }
    }

    #[test]
    fn test_acquire_request_camel_case() {
        let req: AcquireRequest = serde_json::from_str(
            r#"{"resourceType":"project","resourceId":"p1","ownerId":"u1","ownerName":"Ursula"}"#,
        )
        .unwrap();
        assert_eq!(req.resource_type, "project");
        assert_eq!(req.owner_name, "Ursula");
        let key = req.validate().unwrap();
        assert_eq!(key.to_string(), "project::p1");
    }

    #[test]
    fn test_acquire_request_rejects_bad_fields() {
        let mut req = AcquireRequest {
            resource_type: "project".to_string(),
            resource_id: "p1".to_string(),
            owner_id: "".to_string(),
            owner_name: "x".to_string(),
        };
        assert!(matches!(req.validate(), Err(LockError::InvalidRequest(_))));

        req.owner_id = "u1".to_string();
        req.resource_type = "invoice".to_string();
        assert!(matches!(req.validate(), Err(LockError::InvalidRequest(_))));
    }

    #[test]
    fn test_denied_response_omits_token() {
        let json = serde_json::to_value(AcquireResponse::denied(sample_info())).unwrap();
        assert_eq!(json["granted"], false);
        assert!(json.get("token").is_none());
        assert_eq!(json["lock"]["ownerId"], "u1");
        assert_eq!(json["lock"]["expiresAt"], "2024-05-01T08:01:30Z");
    }

    #[test]
    fn test_status_response_unlocked_is_minimal() {
        let json = serde_json::to_value(StatusResponse::unlocked()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "isLocked": false, "isOwnLock": false })
        );
    }

    #[test]
    fn test_token_request_checks_key_only() {
        let mut req = TokenRequest {
            resource_type: "project".to_string(),
            resource_id: "p1".to_string(),
            token: "stale token!".to_string(),
        };
        assert!(req.validate().is_ok());
        assert!(!req.has_well_formed_token());

        req.token = "3f2b9c0d4e5f46a7b8c9d0e1f2a3b4c5".to_string();
        assert!(req.has_well_formed_token());

        req.resource_id = String::new();
        assert!(matches!(req.validate(), Err(LockError::InvalidRequest(_))));
    }

    #[test]
    fn test_status_query_defaults_caller() {
        let q: StatusQuery =
            serde_json::from_str(r#"{"resourceType":"employee","resourceId":"e7"}"#).unwrap();
        assert!(q.caller_id.is_empty());
        assert!(q.validate().is_ok());
    }
}
