//! Lockable resource types and lock keys

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LockError;
use crate::validation::validate_resource_id;

/// The closed set of record kinds that can be locked for editing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Project,
    Employee,
    Vacation,
    TimeEntry,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Project,
        ResourceType::Employee,
        ResourceType::Vacation,
        ResourceType::TimeEntry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Project => "project",
            ResourceType::Employee => "employee",
            ResourceType::Vacation => "vacation",
            ResourceType::TimeEntry => "time_entry",
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = LockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(ResourceType::Project),
            "employee" => Ok(ResourceType::Employee),
            "vacation" => Ok(ResourceType::Vacation),
            "time_entry" => Ok(ResourceType::TimeEntry),
            other => Err(LockError::invalid(format!(
                "unknown resourceType '{}'",
                other
            ))),
        }
    }
}

/// Identity of one lockable record: `(resourceType, resourceId)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockKey {
    pub resource_type: ResourceType,
    pub resource_id: String,
}

impl LockKey {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
        }
    }

    /// Parse and validate a key from raw wire fields
    pub fn parse(resource_type: &str, resource_id: &str) -> Result<Self, LockError> {
        let resource_type = resource_type.parse::<ResourceType>()?;
        validate_resource_id(resource_id)
            .map_err(|e| LockError::invalid(format!("invalid resourceId: {}", e.code)))?;
        Ok(Self::new(resource_type, resource_id))
    }
}

impl Display for LockKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.resource_type, self.resource_id)
    }
}
