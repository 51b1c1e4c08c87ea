//! Destination key and per-upload attributes.
//!
//! Default keys are random 32-hex-digit identifiers. Resolved keys must be non-empty,
//! relative, and free of `..` segments.

use crate::error::{BoxError, FileError};
use crate::options::Resolver;
use crate::validator::EngineConfig;
use formdrop_core::validation::validate_metadata;
use formdrop_core::FileInfo;
use formdrop_storage::UploadRequest;
use uuid::Uuid;

/// A fresh random key.
pub fn random_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Key resolver producing `{prefix}/{random}`.
pub fn prefixed_random_key(prefix: impl Into<String>) -> Resolver<String> {
    let prefix = prefix.into().trim_matches('/').to_string();
    Resolver::from_fn(move |_info: &FileInfo| {
        if prefix.is_empty() {
            Ok(random_key())
        } else {
            Ok(format!("{}/{}", prefix, random_key()))
        }
    })
}

pub fn validate_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("key must not be empty".to_string());
    }
    if key.starts_with('/') {
        return Err(format!("key '{}' must not start with '/'", key));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(format!("key '{}' must not contain '..' segments", key));
    }
    if key.chars().any(|c| c.is_control()) {
        return Err(format!("key '{}' contains control characters", key));
    }
    Ok(())
}

/// Resolve the key, metadata and fixed attributes for one file.
///
/// The returned request still carries an empty content type; it is filled in once
/// content resolution has run.
pub(crate) async fn build_request(
    config: &EngineConfig,
    info: &FileInfo,
) -> Result<UploadRequest, FileError> {
    let key = match config.key {
        Some(ref resolver) => resolver
            .resolve(info)
            .await
            .and_then(|key| validate_key(&key).map(|_| key).map_err(BoxError::from))
            .map_err(|source| FileError::KeyResolution {
                field_name: info.field_name.clone(),
                source,
            })?,
        None => random_key(),
    };

    let metadata_error = |source: BoxError| FileError::MetadataResolution {
        field_name: info.field_name.clone(),
        source,
    };

    let metadata = match config.metadata {
        Some(ref metadata) => {
            let metadata = metadata.resolve(info).await.map_err(metadata_error)?;
            validate_metadata(&metadata).map_err(|e| metadata_error(e.into()))?;
            metadata
        }
        None => Default::default(),
    };

    let content_disposition = match config.content_disposition {
        Some(ref disposition) => Some(disposition.resolve(info).await.map_err(metadata_error)?),
        None => None,
    };

    Ok(UploadRequest {
        bucket: config.bucket.clone(),
        key,
        content_type: String::new(),
        acl: config.acl.clone(),
        server_side_encryption: config.server_side_encryption.clone(),
        sse_kms_key_id: config.sse_kms_key_id.clone(),
        storage_class: config.storage_class.clone(),
        cache_control: config.cache_control.clone(),
        content_disposition,
        content_encoding: config.content_encoding.clone(),
        metadata,
    })
}
