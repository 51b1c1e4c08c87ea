//! Failure and abort paths of upload sessions.
//!
//! Run with: `cargo test -p formdrop-engine --test failure_test`

mod helpers;

use formdrop_engine::{
    ContentTypeMode, EngineOptions, ErrorMetadata, FileError, FileInfo, UploadCause, UploadStage,
};
use formdrop_storage::MemoryClient;
use helpers::fixtures::{create_filler, create_png_68};
use helpers::{body_stream, engine_with, failing_stream, mock_client, settle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn fixed_type() -> EngineOptions {
    EngineOptions::new().content_type(ContentTypeMode::Fixed("image/png".to_string()))
}

#[tokio::test]
async fn test_stream_error_aborts_upload() {
    let client = mock_client();
    let engine = engine_with(&client, fixed_type());

    let err = engine
        .handle_file(FileInfo::new("image"), failing_stream(&create_filler(100), 10, 3))
        .await
        .unwrap_err();

    let upload = err.as_upload().expect("upload error");
    assert_eq!(upload.stage, UploadStage::Stream);
    assert!(upload.is_stream_failure());
    assert_eq!(upload.forwarded, 30);
    assert!(upload.orphaned.is_none());
    assert_eq!(err.http_status_code(), 400);

    assert_eq!(client.aborted_uploads().len(), 1);
    assert_eq!(client.aborted_uploads()[0].key, upload.key);
    assert_eq!(client.in_flight_count(), 0);
    assert_eq!(client.object_count(), 0);
}

#[tokio::test]
async fn test_stream_error_during_lookahead_opens_nothing() {
    let client = mock_client();
    let engine = engine_with(&client, EngineOptions::new().auto_content_type());

    let err = engine
        .handle_file(FileInfo::new("image"), failing_stream(&create_png_68(), 16, 0))
        .await
        .unwrap_err();

    let upload = err.as_upload().expect("upload error");
    assert_eq!(upload.stage, UploadStage::Lookahead);
    assert_eq!(upload.forwarded, 0);
    assert!(client.aborted_uploads().is_empty());
    assert_eq!(client.in_flight_count(), 0);
}

#[tokio::test]
async fn test_initiate_failure() {
    let client = mock_client().fail_initiate();
    let engine = engine_with(&client, fixed_type());

    let err = engine
        .handle_file(FileInfo::new("image"), body_stream(&create_png_68(), 68))
        .await
        .unwrap_err();

    let upload = err.as_upload().expect("upload error");
    assert_eq!(upload.stage, UploadStage::Initiate);
    assert!(matches!(upload.cause, UploadCause::Storage(_)));
    assert!(err.is_recoverable());
    assert_eq!(client.in_flight_count(), 0);
}

#[tokio::test]
async fn test_backend_write_failure_aborts_upload() {
    let client = mock_client().fail_writes_after(2);
    let engine = engine_with(&client, fixed_type());

    let err = engine
        .handle_file(FileInfo::new("image"), body_stream(&create_filler(50), 10))
        .await
        .unwrap_err();

    let upload = err.as_upload().expect("upload error");
    assert_eq!(upload.stage, UploadStage::Write);
    assert_eq!(upload.forwarded, 20);
    assert!(!upload.is_stream_failure());
    assert_eq!(err.http_status_code(), 502);
    assert_eq!(client.aborted_uploads().len(), 1);
    assert_eq!(client.object_count(), 0);
}

#[tokio::test]
async fn test_complete_failure_aborts_upload() {
    let client = mock_client().fail_complete();
    let engine = engine_with(&client, fixed_type());

    let err = engine
        .handle_file(FileInfo::new("image"), body_stream(&create_png_68(), 20))
        .await
        .unwrap_err();

    let upload = err.as_upload().expect("upload error");
    assert_eq!(upload.stage, UploadStage::Complete);
    assert_eq!(upload.forwarded, 68);
    assert_eq!(client.aborted_uploads().len(), 1);
    assert_eq!(client.in_flight_count(), 0);
}

#[tokio::test]
async fn test_failed_abort_reports_orphaned_upload() {
    let backend = mock_client();
    let failing = backend.clone().fail_writes_after(0).fail_abort();
    let engine = engine_with(&failing, fixed_type());

    let err = engine
        .handle_file(FileInfo::new("image"), body_stream(&create_filler(10), 10))
        .await
        .unwrap_err();

    let ticket = err
        .as_upload()
        .and_then(|upload| upload.orphaned.clone())
        .expect("orphaned ticket");
    assert_eq!(backend.in_flight_count(), 1);

    // Same store, without the injected abort failure
    let retry = engine_with(&backend, fixed_type());
    retry.abort_upload(&ticket).await.unwrap();
    assert_eq!(backend.in_flight_count(), 0);
    assert_eq!(backend.aborted_uploads(), vec![ticket.clone()]);

    let again = retry.abort_upload(&ticket).await.unwrap_err();
    assert!(again.is_already_gone());
}

#[tokio::test]
async fn test_dropped_session_aborts_upload() {
    let gate = Arc::new(Semaphore::new(0));
    let client = MemoryClient::new().with_write_gate(gate.clone());
    let engine = engine_with(&client, fixed_type());

    let session = engine.handle_file(FileInfo::new("image"), body_stream(&create_filler(30), 10));
    let outcome = tokio::time::timeout(Duration::from_millis(50), session).await;
    assert!(outcome.is_err(), "session should still be waiting on the backend");

    settle().await;

    assert_eq!(client.aborted_uploads().len(), 1);
    assert_eq!(client.in_flight_count(), 0);
    assert_eq!(client.object_count(), 0);
}

#[tokio::test]
async fn test_failure_is_never_followed_by_success() {
    let client = mock_client();
    let engine = engine_with(&client, fixed_type());

    let err = engine
        .handle_file(FileInfo::new("image"), failing_stream(&create_filler(40), 10, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, FileError::Upload(_)));

    settle().await;
    assert_eq!(client.object_count(), 0);
    assert_eq!(client.aborted_uploads().len(), 1);
}
