//! Configuration module
//!
//! Environment-driven settings for the storage backend and the engine defaults.
//! Programmatic users can skip this entirely and build `EngineOptions` directly.

use std::env;

use crate::constants::{DEFAULT_ENCRYPTION_MODES, DEFAULT_PART_SIZE, MIN_PART_SIZE};
use crate::storage_types::StorageBackend;

/// Storage and engine configuration read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub aws_region: Option<String>,
    pub part_size_bytes: usize,
    pub content_type: Option<String>,
    pub acl: Option<String>,
    pub server_side_encryption: Option<String>,
    pub sse_kms_key_id: Option<String>,
    pub storage_class: Option<String>,
    pub key_prefix: Option<String>,
    pub encryption_modes: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let storage_backend = match non_empty("FORMDROP_STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let part_size_bytes = match non_empty("S3_PART_SIZE_MB") {
            Some(value) => {
                let mb: usize = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("S3_PART_SIZE_MB must be a valid number"))?;
                mb.checked_mul(1024 * 1024)
                    .ok_or_else(|| anyhow::anyhow!("S3_PART_SIZE_MB is too large"))?
            }
            None => DEFAULT_PART_SIZE,
        };

        let encryption_modes = non_empty("FORMDROP_ENCRYPTION_MODES")
            .map(|value| {
                value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                DEFAULT_ENCRYPTION_MODES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let config = Config {
            storage_backend,
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION"),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            aws_region: non_empty("AWS_REGION"),
            part_size_bytes,
            content_type: non_empty("FORMDROP_CONTENT_TYPE"),
            acl: non_empty("FORMDROP_ACL"),
            server_side_encryption: non_empty("FORMDROP_SERVER_SIDE_ENCRYPTION"),
            sse_kms_key_id: non_empty("FORMDROP_SSE_KMS_KEY_ID"),
            storage_class: non_empty("FORMDROP_STORAGE_CLASS"),
            key_prefix: non_empty("FORMDROP_KEY_PREFIX"),
            encryption_modes,
        };

        config.validate()?;

        tracing::debug!(
            backend = %config.storage_backend,
            part_size_bytes = config.part_size_bytes,
            content_type = ?config.content_type,
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.part_size_bytes < MIN_PART_SIZE {
            anyhow::bail!(
                "S3_PART_SIZE_MB must be at least {} MB",
                MIN_PART_SIZE / 1024 / 1024
            );
        }

        if self.storage_backend == StorageBackend::S3 {
            if self.s3_bucket.is_none() {
                anyhow::bail!("S3_BUCKET must be set when using the s3 storage backend");
            }
            if self.region().is_none() {
                anyhow::bail!("S3_REGION or AWS_REGION must be set when using the s3 storage backend");
            }
        }

        if let Some(ref token) = self.server_side_encryption {
            if !self.encryption_modes.iter().any(|m| m == token) {
                anyhow::bail!(
                    "FORMDROP_SERVER_SIDE_ENCRYPTION '{}' is not one of: {}",
                    token,
                    self.encryption_modes.join(", ")
                );
            }
        }

        Ok(())
    }

    /// Region for the S3 client, preferring the storage-specific setting.
    pub fn region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn s3_backend_requires_bucket_and_region() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));

        let err = Config::from_lookup(lookup(&[("S3_BUCKET", "uploads")])).unwrap_err();
        assert!(err.to_string().contains("S3_REGION"));
    }

    #[test]
    fn aws_region_is_a_fallback() {
        let config = Config::from_lookup(lookup(&[
            ("S3_BUCKET", "uploads"),
            ("AWS_REGION", "eu-west-1"),
        ]))
        .unwrap();
        assert_eq!(config.region(), Some("eu-west-1"));
        assert_eq!(config.part_size_bytes, DEFAULT_PART_SIZE);
        assert_eq!(config.encryption_modes.len(), DEFAULT_ENCRYPTION_MODES.len());
    }

    #[test]
    fn memory_backend_needs_no_s3_settings() {
        let config = Config::from_lookup(lookup(&[
            ("FORMDROP_STORAGE_BACKEND", "memory"),
            ("FORMDROP_CONTENT_TYPE", "auto"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.content_type.as_deref(), Some("auto"));
    }

    #[test]
    fn rejects_small_part_size() {
        let err = Config::from_lookup(lookup(&[
            ("FORMDROP_STORAGE_BACKEND", "memory"),
            ("S3_PART_SIZE_MB", "1"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("at least 5 MB"));
    }

    #[test]
    fn rejects_part_size_that_overflows() {
        let huge = usize::MAX.to_string();
        let err = Config::from_lookup(lookup(&[
            ("FORMDROP_STORAGE_BACKEND", "memory"),
            ("S3_PART_SIZE_MB", huge.as_str()),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn encryption_token_must_be_in_configured_set() {
        let err = Config::from_lookup(lookup(&[
            ("FORMDROP_STORAGE_BACKEND", "memory"),
            ("FORMDROP_ENCRYPTION_MODES", "AES256"),
            ("FORMDROP_SERVER_SIDE_ENCRYPTION", "aws:kms"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("aws:kms"));

        let config = Config::from_lookup(lookup(&[
            ("FORMDROP_STORAGE_BACKEND", "memory"),
            ("FORMDROP_ENCRYPTION_MODES", "AES256, provider-managed-key"),
            ("FORMDROP_SERVER_SIDE_ENCRYPTION", "provider-managed-key"),
        ]))
        .unwrap();
        assert_eq!(
            config.encryption_modes,
            vec!["AES256".to_string(), "provider-managed-key".to_string()]
        );
    }
}
