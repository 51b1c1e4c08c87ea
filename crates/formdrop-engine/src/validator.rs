//! Construction-time validation of engine options.

use crate::options::{ContentTypeMode, EngineOptions, Resolvable, Resolver};
use formdrop_core::constants::{DEFAULT_CONTENT_TYPE, DEFAULT_ENCRYPTION_MODES, KMS_ENCRYPTION_MODES};
use formdrop_core::validation::validate_metadata;
use formdrop_core::ConfigurationError;
use formdrop_storage::ObjectClient;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Validated, immutable engine configuration shared by every upload session.
#[derive(Clone)]
pub struct EngineConfig {
    pub(crate) client: Arc<dyn ObjectClient>,
    pub(crate) bucket: String,
    pub(crate) key: Option<Resolver<String>>,
    pub(crate) content_type: ContentTypeMode,
    pub(crate) acl: Option<String>,
    pub(crate) server_side_encryption: Option<String>,
    pub(crate) sse_kms_key_id: Option<String>,
    pub(crate) storage_class: Option<String>,
    pub(crate) cache_control: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_disposition: Option<Resolvable<String>>,
    pub(crate) metadata: Option<Resolvable<BTreeMap<String, String>>>,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("backend", &self.client.backend_type())
            .field("bucket", &self.bucket)
            .field("content_type", &self.content_type)
            .field("acl", &self.acl)
            .field("server_side_encryption", &self.server_side_encryption)
            .field("storage_class", &self.storage_class)
            .finish_non_exhaustive()
    }
}

/// Validate options once, before any upload can start.
pub fn validate(options: EngineOptions) -> Result<EngineConfig, ConfigurationError> {
    let client = options.client.ok_or(ConfigurationError::MissingClient)?;

    let bucket = options
        .bucket
        .ok_or(ConfigurationError::MissingField("bucket"))?;
    let bucket = non_empty("bucket", bucket)?;

    let content_type = match options.content_type {
        None => ContentTypeMode::Fixed(DEFAULT_CONTENT_TYPE.to_string()),
        Some(ContentTypeMode::Fixed(value)) => {
            let value = non_empty("contentType", value)?;
            validate_mime(&value)?;
            ContentTypeMode::Fixed(value)
        }
        Some(mode) => mode,
    };

    let acl = optional_non_empty("acl", options.acl)?;
    let storage_class = optional_non_empty("storageClass", options.storage_class)?;
    let cache_control = optional_non_empty("cacheControl", options.cache_control)?;
    let content_encoding = optional_non_empty("contentEncoding", options.content_encoding)?;
    let sse_kms_key_id = optional_non_empty("sseKmsKeyId", options.sse_kms_key_id)?;

    let allowed: Vec<String> = options.encryption_modes.unwrap_or_else(|| {
        DEFAULT_ENCRYPTION_MODES
            .iter()
            .map(|s| s.to_string())
            .collect()
    });

    let server_side_encryption =
        optional_non_empty("serverSideEncryption", options.server_side_encryption)?;
    if let Some(ref token) = server_side_encryption {
        if !allowed.iter().any(|m| m == token) {
            return Err(ConfigurationError::UnsupportedEncryption {
                token: token.clone(),
                allowed,
            });
        }
    }

    if sse_kms_key_id.is_some() {
        let uses_kms = server_side_encryption
            .as_deref()
            .is_some_and(|token| KMS_ENCRYPTION_MODES.contains(&token));
        if !uses_kms {
            return Err(ConfigurationError::KmsKeyWithoutKms);
        }
    }

    if let Some(Resolvable::Fixed(ref value)) = options.content_disposition {
        if value.trim().is_empty() {
            return Err(ConfigurationError::EmptyField("contentDisposition"));
        }
    }

    if let Some(Resolvable::Fixed(ref metadata)) = options.metadata {
        validate_metadata(metadata).map_err(ConfigurationError::InvalidMetadata)?;
    }

    Ok(EngineConfig {
        client,
        bucket,
        key: options.key,
        content_type,
        acl,
        server_side_encryption,
        sse_kms_key_id,
        storage_class,
        cache_control,
        content_encoding,
        content_disposition: options.content_disposition,
        metadata: options.metadata,
    })
}

fn non_empty(field: &'static str, value: String) -> Result<String, ConfigurationError> {
    if value.trim().is_empty() {
        return Err(ConfigurationError::EmptyField(field));
    }
    Ok(value)
}

fn optional_non_empty(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ConfigurationError> {
    value.map(|v| non_empty(field, v)).transpose()
}

/// Loose `type/subtype` check for fixed content types.
fn validate_mime(value: &str) -> Result<(), ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidValue {
        field: "contentType",
        reason: format!("'{}' {}", value, reason),
    };

    let (kind, subtype) = value
        .split_once('/')
        .ok_or_else(|| invalid("is not of the form type/subtype"))?;
    if kind.trim().is_empty() || subtype.trim().is_empty() {
        return Err(invalid("is not of the form type/subtype"));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(invalid("contains control characters"));
    }
    Ok(())
}
