use crate::coordinator::run_session;
use crate::error::{BoxError, FileError, RemovalError};
use crate::options::EngineOptions;
use crate::removal;
use crate::validator::{validate, EngineConfig};
use bytes::Bytes;
use formdrop_core::{ConfigurationError, FileInfo, UploadedFile};
use formdrop_storage::{ObjectClient, UploadTicket};
use futures::Stream;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Streams form file fields into object storage.
///
/// Cloning is cheap; every clone shares the same validated configuration, and any
/// number of files may be uploaded concurrently through it.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
}

impl Engine {
    /// Validate `options` and build the engine. Nothing touches the backend here.
    pub fn new(options: EngineOptions) -> Result<Self, ConfigurationError> {
        let config = validate(options)?;
        tracing::debug!(config = ?config, "Upload engine configured");
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.config.client
    }

    /// Upload one file field from its chunk stream.
    ///
    /// Resolves once the backend has confirmed the object. On failure the remote
    /// upload has already been aborted (or the error says it could not be).
    pub async fn handle_file<S, E>(&self, info: FileInfo, stream: S) -> Result<UploadedFile, FileError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<BoxError> + Send,
    {
        run_session(&self.config, info, stream).await
    }

    /// Upload one file field from an async reader.
    pub async fn handle_reader<R>(&self, info: FileInfo, reader: R) -> Result<UploadedFile, FileError>
    where
        R: AsyncRead + Send,
    {
        self.handle_file(info, ReaderStream::new(reader)).await
    }

    /// Delete a previously uploaded file.
    ///
    /// Removing the same file twice yields a [`RemovalError`] whose
    /// `is_already_gone()` is true. The error is informational; it should be logged or
    /// reported, not turned into a request failure.
    pub async fn remove_file(&self, file: &UploadedFile) -> Result<(), RemovalError> {
        removal::remove_object(self.config.client.as_ref(), file).await
    }

    /// Remove several files, returning the ones that could not be removed.
    pub async fn remove_files(&self, files: &[UploadedFile]) -> Vec<RemovalError> {
        removal::remove_all(self.config.client.as_ref(), files).await
    }

    /// Abort an upload left open by a failed session (see `UploadError::orphaned`).
    pub async fn abort_upload(&self, ticket: &UploadTicket) -> Result<(), RemovalError> {
        removal::abort_ticket(self.config.client.as_ref(), ticket).await
    }
}
