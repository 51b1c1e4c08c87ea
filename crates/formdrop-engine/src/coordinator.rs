//! Stream upload coordinator
//!
//! Drives one file from its incoming byte stream into one multipart upload. Chunks are
//! forwarded strictly in order and the next chunk is not read until the backend has
//! accepted the previous one, so a slow backend pauses the incoming stream instead of
//! growing a buffer. Any failure after the upload was opened aborts it before the error
//! is returned, and dropping the session mid-transfer schedules the same abort.

use crate::content_type::sniff;
use crate::error::{BoxError, FileError, UploadCause, UploadError, UploadStage};
use crate::keys::build_request;
use crate::options::ContentTypeMode;
use crate::validator::EngineConfig;
use bytes::Bytes;
use formdrop_core::constants::DEFAULT_CONTENT_TYPE;
use formdrop_core::{FileInfo, UploadedFile};
use formdrop_storage::{
    CompletedUpload, ObjectClient, StorageError, UploadHandle, UploadRequest, UploadTicket,
};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;

/// Upload one file stream and describe the stored object.
#[tracing::instrument(
    skip(config, info, stream),
    fields(field = %info.field_name, bucket = %config.bucket)
)]
pub(crate) async fn run_session<S, E>(
    config: &EngineConfig,
    info: FileInfo,
    stream: S,
) -> Result<UploadedFile, FileError>
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Into<BoxError> + Send,
{
    let start = Instant::now();
    let mut request = build_request(config, &info).await?;
    let mut stream = std::pin::pin!(stream);

    // In auto mode the first non-empty chunk is held back until the upload is open
    let mut held: Option<Bytes> = None;
    let mut stream_ended = false;
    request.content_type = match config.content_type {
        ContentTypeMode::Fixed(ref content_type) => content_type.clone(),
        ContentTypeMode::Resolver(ref resolver) => {
            resolver
                .resolve(&info)
                .await
                .map_err(|source| FileError::ContentResolution {
                    field_name: info.field_name.clone(),
                    source,
                })?
        }
        ContentTypeMode::Auto => {
            loop {
                match stream.next().await {
                    Some(Ok(chunk)) if chunk.is_empty() => continue,
                    Some(Ok(chunk)) => {
                        held = Some(chunk);
                        break;
                    }
                    Some(Err(e)) => {
                        return Err(failure(&request, UploadStage::Lookahead, 0, stream_cause(e), None));
                    }
                    None => {
                        stream_ended = true;
                        break;
                    }
                }
            }
            held.as_deref().map_or(DEFAULT_CONTENT_TYPE, sniff).to_string()
        }
    };

    tracing::debug!(
        key = %request.key,
        content_type = %request.content_type,
        "Opening multipart upload"
    );

    let handle = config
        .client
        .create_upload(&request)
        .await
        .map_err(|e| failure(&request, UploadStage::Initiate, 0, e.into(), None))?;

    let mut upload = ArmedUpload::new(handle, Arc::clone(&config.client));
    let mut forwarded: u64 = 0;

    if let Some(chunk) = held {
        let len = chunk.len() as u64;
        if let Err(e) = upload.write(chunk).await {
            return Err(upload.fail(&request, UploadStage::Write, forwarded, e.into()).await);
        }
        forwarded += len;
    }

    if !stream_ended {
        while let Some(item) = stream.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    return Err(upload
                        .fail(&request, UploadStage::Stream, forwarded, stream_cause(e))
                        .await);
                }
            };
            if chunk.is_empty() {
                continue;
            }
            let len = chunk.len() as u64;
            if let Err(e) = upload.write(chunk).await {
                return Err(upload.fail(&request, UploadStage::Write, forwarded, e.into()).await);
            }
            forwarded += len;
        }
    }

    let completed = match upload.complete().await {
        Ok(completed) => completed,
        Err(e) => {
            return Err(upload.fail(&request, UploadStage::Complete, forwarded, e.into()).await);
        }
    };

    tracing::info!(
        key = %request.key,
        content_type = %request.content_type,
        size_bytes = forwarded,
        duration_ms = start.elapsed().as_millis() as u64,
        "Upload completed"
    );

    Ok(uploaded_file(info, request, forwarded, completed))
}

fn stream_cause<E: Into<BoxError>>(e: E) -> UploadCause {
    UploadCause::Stream(e.into())
}

fn failure(
    request: &UploadRequest,
    stage: UploadStage,
    forwarded: u64,
    cause: UploadCause,
    orphaned: Option<UploadTicket>,
) -> FileError {
    tracing::warn!(
        key = %request.key,
        stage = %stage,
        forwarded_bytes = forwarded,
        error = %cause,
        "Upload failed"
    );
    FileError::Upload(UploadError {
        bucket: request.bucket.clone(),
        key: request.key.clone(),
        stage,
        forwarded,
        cause,
        orphaned,
    })
}

fn uploaded_file(
    info: FileInfo,
    request: UploadRequest,
    size: u64,
    completed: CompletedUpload,
) -> UploadedFile {
    UploadedFile {
        field_name: info.field_name,
        original_name: info.original_name,
        encoding: info.encoding,
        mimetype: info.mimetype,
        content_type: request.content_type,
        size,
        bucket: request.bucket,
        key: request.key,
        location: completed.location,
        etag: completed.etag,
        version_id: completed.version_id,
        acl: request.acl,
        server_side_encryption: request.server_side_encryption,
        storage_class: request.storage_class,
        content_disposition: request.content_disposition,
        content_encoding: request.content_encoding,
        cache_control: request.cache_control,
        metadata: request.metadata,
    }
}

/// An open upload that is aborted unless it completes.
///
/// Explicit failures abort inline so the outcome can be reported. If the session
/// future is dropped instead, the abort is handed to the runtime from `Drop`.
struct ArmedUpload {
    handle: Box<dyn UploadHandle>,
    client: Arc<dyn ObjectClient>,
    armed: bool,
}

impl ArmedUpload {
    fn new(handle: Box<dyn UploadHandle>, client: Arc<dyn ObjectClient>) -> Self {
        Self {
            handle,
            client,
            armed: true,
        }
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        self.handle.write(chunk).await
    }

    async fn complete(&mut self) -> Result<CompletedUpload, StorageError> {
        let completed = self.handle.complete().await?;
        self.armed = false;
        Ok(completed)
    }

    /// Abort the upload and build the session error. A failed abort leaves the
    /// ticket in the error so the caller can retry it.
    async fn fail(
        &mut self,
        request: &UploadRequest,
        stage: UploadStage,
        forwarded: u64,
        cause: UploadCause,
    ) -> FileError {
        self.armed = false;
        let ticket = self.handle.ticket().clone();
        let orphaned = match self.handle.abort().await {
            Ok(()) => None,
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!(
                    key = %ticket.key,
                    upload_id = %ticket.upload_id,
                    error = %e,
                    "Failed to abort multipart upload"
                );
                Some(ticket)
            }
        };
        failure(request, stage, forwarded, cause, orphaned)
    }
}

impl Drop for ArmedUpload {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let ticket = self.handle.ticket().clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let client = Arc::clone(&self.client);
                tracing::debug!(key = %ticket.key, "Upload dropped mid-transfer, aborting");
                runtime.spawn(async move {
                    if let Err(e) = client.abort_upload(&ticket).await {
                        tracing::warn!(
                            key = %ticket.key,
                            upload_id = %ticket.upload_id,
                            error = %e,
                            "Failed to abort dropped upload"
                        );
                    }
                });
            }
            Err(_) => {
                tracing::warn!(
                    key = %ticket.key,
                    upload_id = %ticket.upload_id,
                    "Upload dropped outside a runtime; it was not aborted"
                );
            }
        }
    }
}
