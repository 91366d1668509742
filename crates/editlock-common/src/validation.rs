//! Input validation for lock requests
//!
//! Every field is checked before a request reaches the lock store.

use validator::ValidationError;

use crate::error::LockError;

/// Maximum length for resource_id field
pub const MAX_RESOURCE_ID_LENGTH: usize = 128;

/// Maximum length for owner_id field
pub const MAX_OWNER_ID_LENGTH: usize = 128;

/// Maximum length for owner_name field
pub const MAX_OWNER_NAME_LENGTH: usize = 256;

/// Maximum length for token field
pub const MAX_TOKEN_LENGTH: usize = 64;

/// Validate resource_id format
///
/// Resource ID must:
/// - Not be empty
/// - Not exceed MAX_RESOURCE_ID_LENGTH characters
/// - Contain only alphanumeric characters, dots, hyphens, underscores and colons
pub fn validate_resource_id(resource_id: &str) -> Result<(), ValidationError> {
    if resource_id.is_empty() {
        return Err(ValidationError::new("resource_id_empty"));
    }
    if resource_id.len() > MAX_RESOURCE_ID_LENGTH {
        return Err(ValidationError::new("resource_id_too_long"));
    }
    if !resource_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ':')
    {
        return Err(ValidationError::new("resource_id_invalid_chars"));
    }
    Ok(())
}

/// Validate owner_id format
pub fn validate_owner_id(owner_id: &str) -> Result<(), ValidationError> {
    if owner_id.trim().is_empty() {
        return Err(ValidationError::new("owner_id_empty"));
    }
    if owner_id.len() > MAX_OWNER_ID_LENGTH {
        return Err(ValidationError::new("owner_id_too_long"));
    }
    Ok(())
}

/// Validate owner_name (display name; may be empty)
pub fn validate_owner_name(owner_name: &str) -> Result<(), ValidationError> {
    if owner_name.len() > MAX_OWNER_NAME_LENGTH {
        return Err(ValidationError::new("owner_name_too_long"));
    }
    if owner_name.chars().any(|c| c.is_control()) {
        return Err(ValidationError::new("owner_name_invalid_chars"));
    }
    Ok(())
}

/// Validate token format
pub fn validate_token(token: &str) -> Result<(), ValidationError> {
    if token.is_empty() {
        return Err(ValidationError::new("token_empty"));
    }
    if token.len() > MAX_TOKEN_LENGTH {
        return Err(ValidationError::new("token_too_long"));
    }
    if !token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::new("token_invalid_chars"));
    }
    Ok(())
}

/// Convert a field validation failure into a `LockError::InvalidRequest`
pub fn invalid_field(field: &str, err: ValidationError) -> LockError {
    LockError::invalid(format!("invalid {}: {}", field, err.code))
}
