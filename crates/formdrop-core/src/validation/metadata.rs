//! Object metadata validation
//!
//! User metadata travels as `x-amz-meta-*` headers, so keys must be header tokens and
//! the whole map must fit in the 2 KiB S3 allows for user metadata.

use std::collections::BTreeMap;

/// Maximum length for a single metadata key
pub const MAX_METADATA_KEY_LENGTH: usize = 128;

/// Maximum combined size of all keys and values, in bytes
pub const MAX_METADATA_BYTES: usize = 2048;

/// Validate a metadata key name
///
/// Rules:
/// - Non-empty, at most 128 characters
/// - Letters, digits, hyphen, underscore and dot only
pub fn validate_metadata_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Metadata key cannot be empty".to_string());
    }

    if key.len() > MAX_METADATA_KEY_LENGTH {
        return Err(format!(
            "Metadata key '{}' exceeds maximum length of {} characters",
            key, MAX_METADATA_KEY_LENGTH
        ));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(format!(
            "Metadata key '{}' contains invalid characters. Allowed: letters, digits, hyphen (-), underscore (_), dot (.)",
            key
        ));
    }

    Ok(())
}

/// Validate a whole metadata map
pub fn validate_metadata(metadata: &BTreeMap<String, String>) -> Result<(), String> {
    let mut total = 0usize;

    for (key, value) in metadata {
        validate_metadata_key(key)?;

        if value.chars().any(|c| c.is_control()) {
            return Err(format!(
                "Metadata value for '{}' contains control characters",
                key
            ));
        }

        total += key.len() + value.len();
    }

    if total > MAX_METADATA_BYTES {
        return Err(format!(
            "Metadata is {} bytes, exceeding the limit of {} bytes",
            total, MAX_METADATA_BYTES
        ));
    }

    Ok(())
}
