//! Formdrop Upload Engine
//!
//! Streams file fields of multipart form requests into object storage as they arrive.
//! One [`Engine`] is built from validated [`EngineOptions`] and shared by every request;
//! each file gets its own upload session that:
//!
//! 1. resolves the destination key, metadata and attributes,
//! 2. resolves the content type, sniffing the leading bytes when asked to,
//! 3. opens a multipart upload and forwards chunks in order under backpressure,
//! 4. completes the upload, or aborts it on any failure.
//!
//! ```ignore
//! let engine = Engine::new(
//!     EngineOptions::new()
//!         .client(client)
//!         .bucket("uploads")
//!         .auto_content_type()
//!         .server_side_encryption("AES256"),
//! )?;
//! let file = engine.handle_file(FileInfo::new("avatar"), body_stream).await?;
//! ```

pub mod content_type;
mod coordinator;
pub mod engine;
pub mod error;
pub mod keys;
#[cfg(feature = "axum")]
pub mod multipart;
pub mod options;
mod removal;
pub mod validator;

pub use content_type::sniff;
pub use engine::Engine;
pub use error::{BoxError, FileError, RemovalError, UploadCause, UploadError, UploadStage};
pub use formdrop_core::{ConfigurationError, ErrorMetadata, FileInfo, UploadedFile};
pub use options::{ContentTypeMode, EngineOptions, Resolvable, Resolver};
pub use validator::EngineConfig;

#[cfg(feature = "axum")]
pub use multipart::{store_multipart, upload_field, FormError, StoredForm};
