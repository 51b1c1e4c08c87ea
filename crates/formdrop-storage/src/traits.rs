//! Object storage client abstraction
//!
//! This module defines the seam between the upload engine and the storage backend:
//! an `ObjectClient` opens multipart uploads and an `UploadHandle` receives the bytes
//! of exactly one of them.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Initiate upload failed: {0}")]
    InitiateFailed(String),

    #[error("Upload of part {part_number} failed: {message}")]
    PartFailed { part_number: i32, message: String },

    #[error("Complete upload failed: {0}")]
    CompleteFailed(String),

    #[error("Abort upload failed: {0}")]
    AbortFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload is no longer active: {0}")]
    UploadClosed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Everything the backend needs to open a multipart upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub acl: Option<String>,
    pub server_side_encryption: Option<String>,
    pub sse_kms_key_id: Option<String>,
    pub storage_class: Option<String>,
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Backend response to a finalized upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub etag: Option<String>,
    pub location: String,
    pub version_id: Option<String>,
}

/// Identifies an in-flight multipart upload independently of its handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadTicket {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// Object storage client
///
/// Implementations are shared read-only by every concurrent upload session, so they
/// must be cheap to call through an `Arc` and hold no per-upload state themselves.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Open a multipart upload registered with the request's attributes.
    async fn create_upload(&self, request: &UploadRequest) -> StorageResult<Box<dyn UploadHandle>>;

    /// Abort an upload known only by its ticket (the handle is gone).
    async fn abort_upload(&self, ticket: &UploadTicket) -> StorageResult<()>;

    /// Delete a stored object. Returns `NotFound` if there is nothing to delete.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// One open multipart upload, exclusively owned by a single upload session.
#[async_trait]
pub trait UploadHandle: Send {
    fn ticket(&self) -> &UploadTicket;

    /// Forward the next chunk of the object, in stream order.
    ///
    /// The returned future does not resolve until the backend can take more data;
    /// callers must not read further input while it is pending.
    async fn write(&mut self, chunk: Bytes) -> StorageResult<()>;

    /// Flush buffered data and finalize the object.
    async fn complete(&mut self) -> StorageResult<CompletedUpload>;

    /// Discard the upload and every part sent so far.
    async fn abort(&mut self) -> StorageResult<()>;
}
