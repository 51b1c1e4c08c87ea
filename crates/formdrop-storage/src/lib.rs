//! Formdrop Storage Library
//!
//! This crate provides the object-storage client abstraction used by the upload engine,
//! and implementations for S3 (and S3-compatible providers) and an in-process memory store.
//!
//! # Upload model
//!
//! Every file is written through a multipart upload: the engine opens it with
//! [`ObjectClient::create_upload`], forwards chunks in order through the returned
//! [`UploadHandle`], and finally completes or aborts it. Backends apply backpressure by
//! not resolving [`UploadHandle::write`] until they can accept more data.

pub mod factory;
#[cfg(feature = "storage-memory")]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_client;
pub use formdrop_core::StorageBackend;
#[cfg(feature = "storage-memory")]
pub use memory::{MemoryClient, StoredObject};
#[cfg(feature = "storage-s3")]
pub use s3::S3Client;
pub use traits::{
    CompletedUpload, ObjectClient, StorageError, StorageResult, UploadHandle, UploadRequest,
    UploadTicket,
};
