//! Formdrop Core Library
//!
//! This crate provides the domain models, constants, error types and configuration
//! that are shared across all formdrop components: the storage backends, the upload
//! engine and the CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigurationError, ErrorMetadata, LogLevel};
pub use models::{FileInfo, UploadedFile};
pub use storage_types::StorageBackend;
