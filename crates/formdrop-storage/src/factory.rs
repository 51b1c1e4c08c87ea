#[cfg(feature = "storage-memory")]
use crate::MemoryClient;
#[cfg(feature = "storage-s3")]
use crate::S3Client;
use crate::{ObjectClient, StorageBackend, StorageError, StorageResult};
use formdrop_core::Config;
use std::sync::Arc;

/// Create an object client based on configuration
pub async fn create_client(config: &Config) -> StorageResult<Arc<dyn ObjectClient>> {
    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = config.region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let client = S3Client::new(region, endpoint)
                .await?
                .with_part_size(config.part_size_bytes)?;
            Ok(Arc::new(client))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-memory")]
        StorageBackend::Memory => Ok(Arc::new(MemoryClient::new())),

        #[cfg(not(feature = "storage-memory"))]
        StorageBackend::Memory => Err(StorageError::ConfigError(
            "Memory storage backend not available (storage-memory feature not enabled)".to_string(),
        )),
    }
}
