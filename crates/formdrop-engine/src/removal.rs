//! Best-effort removal of stored objects and open uploads.
//!
//! Failures are returned as [`RemovalError`] and logged, but callers are expected to
//! report them rather than fail the request that triggered the cleanup.

use crate::error::RemovalError;
use formdrop_core::UploadedFile;
use formdrop_storage::{ObjectClient, UploadTicket};

pub(crate) async fn remove_object(
    client: &dyn ObjectClient,
    file: &UploadedFile,
) -> Result<(), RemovalError> {
    match client.delete_object(&file.bucket, &file.key).await {
        Ok(()) => {
            tracing::debug!(bucket = %file.bucket, key = %file.key, "Removed uploaded file");
            Ok(())
        }
        Err(source) => {
            let err = RemovalError {
                bucket: file.bucket.clone(),
                key: file.key.clone(),
                source,
            };
            if err.is_already_gone() {
                tracing::debug!(bucket = %file.bucket, key = %file.key, "File already removed");
            } else {
                tracing::warn!(error = %err, "Failed to remove uploaded file");
            }
            Err(err)
        }
    }
}

pub(crate) async fn abort_ticket(
    client: &dyn ObjectClient,
    ticket: &UploadTicket,
) -> Result<(), RemovalError> {
    client.abort_upload(ticket).await.map_err(|source| {
        let err = RemovalError {
            bucket: ticket.bucket.clone(),
            key: ticket.key.clone(),
            source,
        };
        tracing::warn!(upload_id = %ticket.upload_id, error = %err, "Failed to abort upload");
        err
    })
}

/// Remove every file, continuing past failures. Returns the failures.
pub(crate) async fn remove_all(
    client: &dyn ObjectClient,
    files: &[UploadedFile],
) -> Vec<RemovalError> {
    let results = futures::future::join_all(files.iter().map(|file| remove_object(client, file))).await;
    let failures: Vec<RemovalError> = results.into_iter().filter_map(Result::err).collect();

    if !failures.is_empty() {
        tracing::warn!(
            attempted = files.len(),
            failed = failures.len(),
            "Some uploaded files could not be removed"
        );
    }
    failures
}
