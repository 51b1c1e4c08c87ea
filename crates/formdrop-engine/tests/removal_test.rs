//! Removal of uploaded files.
//!
//! Run with: `cargo test -p formdrop-engine --test removal_test`

mod helpers;

use formdrop_engine::{EngineOptions, ErrorMetadata, FileInfo, UploadedFile};
use helpers::fixtures::create_png_68;
use helpers::{body_stream, engine_with, mock_client, BUCKET};

async fn upload(engine: &formdrop_engine::Engine, name: &str) -> UploadedFile {
    engine
        .handle_file(
            FileInfo::new("image").with_original_name(name),
            body_stream(&create_png_68(), 68),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_remove_file() {
    let client = mock_client();
    let engine = engine_with(&client, EngineOptions::new());

    let file = upload(&engine, "ffffff.png").await;
    assert!(client.object(BUCKET, &file.key).is_some());

    engine.remove_file(&file).await.unwrap();
    assert!(client.object(BUCKET, &file.key).is_none());
}

#[tokio::test]
async fn test_remove_file_twice_reports_removal_error() {
    let client = mock_client();
    let engine = engine_with(&client, EngineOptions::new());
    let file = upload(&engine, "ffffff.png").await;

    engine.remove_file(&file).await.unwrap();
    let err = engine.remove_file(&file).await.unwrap_err();

    assert!(err.is_already_gone());
    assert!(!err.is_fatal());
    assert_eq!(err.key, file.key);
    assert_eq!(err.bucket, BUCKET);
}

#[tokio::test]
async fn test_backend_delete_failure_is_reported() {
    let backend = mock_client();
    let engine = engine_with(&backend, EngineOptions::new());
    let file = upload(&engine, "ffffff.png").await;

    let failing = engine_with(&backend.clone().fail_delete(), EngineOptions::new());
    let err = failing.remove_file(&file).await.unwrap_err();

    assert!(!err.is_already_gone());
    assert!(err.is_recoverable());
    assert!(!err.is_fatal());
    assert!(backend.object(BUCKET, &file.key).is_some());
}

#[tokio::test]
async fn test_remove_files_continues_past_failures() {
    let client = mock_client();
    let engine = engine_with(&client, EngineOptions::new());

    let first = upload(&engine, "a.png").await;
    let second = upload(&engine, "b.png").await;
    let third = upload(&engine, "c.png").await;
    engine.remove_file(&second).await.unwrap();

    let failures = engine.remove_files(&[first, second.clone(), third]).await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].key, second.key);
    assert_eq!(client.object_count(), 0);
}
