//! Lock record and operation outcomes

use chrono::{DateTime, Utc};
use uuid::Uuid;

use editlock_common::LockKey;

/// One currently-held lock.
///
/// `expires_at` is the sole authority on validity: a record with
/// `now > expires_at` is logically absent even while it is still stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    pub key: LockKey,
    pub owner_id: String,
    pub owner_name: String,
    /// Proof of ownership. Minted per grant, unchanged by renewals.
    pub token: String,
    pub acquired_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// Build a fresh grant with a newly minted token
    pub fn grant(
        key: LockKey,
        owner_id: impl Into<String>,
        owner_name: impl Into<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            key,
            owner_id: owner_id.into(),
            owner_name: owner_name.into(),
            token: mint_token(),
            acquired_at: now,
            last_heartbeat_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now)
    }

    pub fn owner(&self) -> LockOwner {
        LockOwner::from(self)
    }
}

/// Tokens are random UUIDs rendered without hyphens
pub fn mint_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Public information about a holder; never includes the token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOwner {
    pub owner_id: String,
    pub owner_name: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&LockRecord> for LockOwner {
    fn from(record: &LockRecord) -> Self {
        Self {
            owner_id: record.owner_id.clone(),
            owner_name: record.owner_name.clone(),
            acquired_at: record.acquired_at,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// `reacquired` is true when the caller already held the lock and the
    /// existing grant (same token) was extended.
    Granted { record: LockRecord, reacquired: bool },
    /// Held by another valid owner. A business outcome, not a failure.
    Denied { holder: LockOwner },
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            AcquireOutcome::Granted { record, .. } => Some(&record.token),
            AcquireOutcome::Denied { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    Renewed { expires_at: DateTime<Utc> },
    /// The token is unknown, superseded, or its record expired.
    NotOwned,
}

impl RenewOutcome {
    pub fn is_renewed(&self) -> bool {
        matches!(self, RenewOutcome::Renewed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// Nothing to release: already gone, expired, or held under another token.
    NotHeld,
}

/// Read-only view returned by `LockManager::status`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockStatus {
    pub holder: Option<LockOwner>,
    pub is_own_lock: bool,
}

impl LockStatus {
    pub fn is_locked(&self) -> bool {
        self.holder.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use editlock_common::ResourceType;

    #[test]
    fn test_grant_sets_lease_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = LockRecord::grant(
            LockKey::new(ResourceType::Project, "p1"),
            "u1",
            "Ursula",
            now,
            chrono::Duration::seconds(90),
        );
        assert_eq!(record.acquired_at, now);
        assert_eq!(record.last_heartbeat_at, now);
        assert_eq!(record.expires_at, now + chrono::Duration::seconds(90));
        assert_eq!(record.token.len(), 32);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let record = LockRecord::grant(
            LockKey::new(ResourceType::Employee, "e1"),
            "u1",
            "",
            now,
            chrono::Duration::seconds(10),
        );
        assert!(record.is_valid_at(now + chrono::Duration::seconds(10)));
        assert!(record.is_expired_at(now + chrono::Duration::milliseconds(10_001)));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(mint_token(), mint_token());
    }
}
