//! Runtime error types
//!
//! Every per-file failure reaches the caller as a [`FileError`]. Upload failures carry
//! the stage they happened in and, when the best-effort abort of the remote multipart
//! upload itself failed, the ticket needed to retry that abort later.

use formdrop_core::{ErrorMetadata, LogLevel};
use formdrop_storage::{StorageError, UploadTicket};
use std::fmt;
use thiserror::Error;

/// Boxed error returned by user-supplied resolvers and incoming streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a failed file upload, surfaced to the parser's per-file completion.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("content type resolution failed for field `{field_name}`: {source}")]
    ContentResolution {
        field_name: String,
        #[source]
        source: BoxError,
    },

    #[error("key resolution failed for field `{field_name}`: {source}")]
    KeyResolution {
        field_name: String,
        #[source]
        source: BoxError,
    },

    #[error("metadata resolution failed for field `{field_name}`: {source}")]
    MetadataResolution {
        field_name: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl FileError {
    pub fn as_upload(&self) -> Option<&UploadError> {
        match self {
            FileError::Upload(err) => Some(err),
            _ => None,
        }
    }
}

/// Point of the upload protocol at which a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    /// Reading the sniffing lookahead, before any remote call
    Lookahead,
    Initiate,
    /// The incoming stream reported an error mid-transfer
    Stream,
    Write,
    Complete,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            UploadStage::Lookahead => "lookahead",
            UploadStage::Initiate => "initiate",
            UploadStage::Stream => "stream",
            UploadStage::Write => "write",
            UploadStage::Complete => "complete",
        };
        f.write_str(stage)
    }
}

/// What went wrong underneath an [`UploadError`].
#[derive(Debug, Error)]
pub enum UploadCause {
    #[error("incoming stream failed: {0}")]
    Stream(#[source] BoxError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A session that failed after its key was resolved.
#[derive(Debug, Error)]
#[error("upload of `{key}` to bucket `{bucket}` failed during {stage}: {cause}")]
pub struct UploadError {
    pub bucket: String,
    pub key: String,
    pub stage: UploadStage,
    /// Bytes forwarded to the backend before the failure
    pub forwarded: u64,
    #[source]
    pub cause: UploadCause,
    /// Set when the remote upload could not be aborted and is still open
    pub orphaned: Option<UploadTicket>,
}

impl UploadError {
    pub fn is_stream_failure(&self) -> bool {
        matches!(self.cause, UploadCause::Stream(_))
    }
}

/// Best-effort cleanup that did not succeed. Never fatal to the request.
#[derive(Debug, Error)]
#[error("failed to remove `{key}` from bucket `{bucket}`: {source}")]
pub struct RemovalError {
    pub bucket: String,
    pub key: String,
    #[source]
    pub source: StorageError,
}

impl RemovalError {
    /// The object (or upload) did not exist anymore.
    pub fn is_already_gone(&self) -> bool {
        self.source.is_not_found()
    }
}

impl ErrorMetadata for FileError {
    fn http_status_code(&self) -> u16 {
        match self {
            FileError::ContentResolution { .. } => 415,
            FileError::KeyResolution { .. } | FileError::MetadataResolution { .. } => 500,
            FileError::Upload(err) if err.is_stream_failure() => 400,
            FileError::Upload(_) => 502,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            FileError::ContentResolution { .. } => "CONTENT_RESOLUTION_FAILED",
            FileError::KeyResolution { .. } => "KEY_RESOLUTION_FAILED",
            FileError::MetadataResolution { .. } => "METADATA_RESOLUTION_FAILED",
            FileError::Upload(_) => "UPLOAD_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, FileError::Upload(err) if !err.is_stream_failure())
    }

    fn log_level(&self) -> LogLevel {
        match self {
            FileError::Upload(err) if !err.is_stream_failure() => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

impl ErrorMetadata for RemovalError {
    fn http_status_code(&self) -> u16 {
        502
    }

    fn error_code(&self) -> &'static str {
        "REMOVAL_FAILED"
    }

    fn is_recoverable(&self) -> bool {
        !self.is_already_gone()
    }

    fn is_fatal(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_error(cause: UploadCause) -> FileError {
        FileError::Upload(UploadError {
            bucket: "test".to_string(),
            key: "k".to_string(),
            stage: UploadStage::Write,
            forwarded: 10,
            cause,
            orphaned: None,
        })
    }

    #[test]
    fn stream_failures_are_client_errors() {
        let err = upload_error(UploadCause::Stream("truncated body".into()));
        assert_eq!(err.http_status_code(), 400);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn storage_failures_are_recoverable_gateway_errors() {
        let err = upload_error(UploadCause::Storage(StorageError::BackendError(
            "timeout".to_string(),
        )));
        assert_eq!(err.http_status_code(), 502);
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("during write"));
    }

    #[test]
    fn removal_errors_are_not_fatal() {
        let err = RemovalError {
            bucket: "test".to_string(),
            key: "k".to_string(),
            source: StorageError::NotFound("k".to_string()),
        };
        assert!(!err.is_fatal());
        assert!(err.is_already_gone());
        assert!(!err.is_recoverable());
    }
}
