//! axum multipart adapter
//!
//! Feeds the file fields of an `axum::extract::Multipart` body through an [`Engine`].
//! Text fields are collected as-is. If the form fails part way, files already stored
//! for it are removed before the error is returned.

use crate::engine::Engine;
use crate::error::{FileError, RemovalError};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use formdrop_core::{ErrorMetadata, FileInfo, LogLevel, UploadedFile};
use thiserror::Error;

/// Text fields and stored files of one form, in body order.
#[derive(Debug, Default)]
pub struct StoredForm {
    pub fields: Vec<(String, String)>,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("malformed multipart body: {source}")]
    Multipart {
        #[source]
        source: MultipartError,
        /// Files of this form that could not be removed afterwards
        cleanup: Vec<RemovalError>,
    },

    #[error("{source}")]
    File {
        #[source]
        source: FileError,
        cleanup: Vec<RemovalError>,
    },
}

impl FormError {
    pub fn cleanup_failures(&self) -> &[RemovalError] {
        match self {
            FormError::Multipart { cleanup, .. } | FormError::File { cleanup, .. } => cleanup,
        }
    }
}

impl ErrorMetadata for FormError {
    fn http_status_code(&self) -> u16 {
        match self {
            FormError::Multipart { .. } => 400,
            FormError::File { source, .. } => source.http_status_code(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            FormError::Multipart { .. } => "MALFORMED_MULTIPART",
            FormError::File { source, .. } => source.error_code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            FormError::Multipart { .. } => false,
            FormError::File { source, .. } => source.is_recoverable(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            FormError::Multipart { .. } => LogLevel::Debug,
            FormError::File { source, .. } => source.log_level(),
        }
    }
}

/// Describe a multipart field the way the engine's resolvers see it.
pub fn file_info(field: &Field<'_>) -> FileInfo {
    FileInfo {
        field_name: field.name().unwrap_or_default().to_string(),
        original_name: field.file_name().map(str::to_string),
        encoding: field
            .headers()
            .get("content-transfer-encoding")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        mimetype: field.content_type().map(str::to_string),
        context: Default::default(),
    }
}

/// Stream a single file field into storage.
pub async fn upload_field(engine: &Engine, field: Field<'_>) -> Result<UploadedFile, FileError> {
    let info = file_info(&field);
    engine.handle_file(info, field).await
}

/// Store every file field of `multipart`, collecting text fields alongside.
pub async fn store_multipart(
    engine: &Engine,
    mut multipart: Multipart,
) -> Result<StoredForm, FormError> {
    let mut form = StoredForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(source) => {
                let cleanup = engine.remove_files(&form.files).await;
                return Err(FormError::Multipart { source, cleanup });
            }
        };

        if field.file_name().is_none() {
            let name = field.name().unwrap_or_default().to_string();
            match field.text().await {
                Ok(text) => form.fields.push((name, text)),
                Err(source) => {
                    let cleanup = engine.remove_files(&form.files).await;
                    return Err(FormError::Multipart { source, cleanup });
                }
            }
            continue;
        }

        match upload_field(engine, field).await {
            Ok(file) => form.files.push(file),
            Err(source) => {
                let cleanup = engine.remove_files(&form.files).await;
                tracing::warn!(
                    stored = form.files.len(),
                    cleanup_failures = cleanup.len(),
                    error = %source,
                    "Form upload failed, removed stored files"
                );
                return Err(FormError::File { source, cleanup });
            }
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::EngineOptions;
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use formdrop_storage::MemoryClient;
    use std::sync::Arc;

    const BOUNDARY: &str = "formdrop-boundary";

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn multipart(body: Vec<u8>) -> Multipart {
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    fn engine(client: &MemoryClient) -> Engine {
        Engine::new(
            EngineOptions::new()
                .client(Arc::new(client.clone()))
                .bucket("test")
                .auto_content_type(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn stores_files_and_collects_text_fields() {
        let client = MemoryClient::new();
        let engine = engine(&client);
        let body = multipart_body(&[
            ("title", None, &b"holiday"[..]),
            ("doc", Some("notes.pdf"), &b"%PDF-1.4 tiny"[..]),
            ("raw", Some("blob.bin"), &b"\x00\x01\x02"[..]),
        ]);

        let form = store_multipart(&engine, multipart(body).await).await.unwrap();

        assert_eq!(form.fields, vec![("title".to_string(), "holiday".to_string())]);
        assert_eq!(form.files.len(), 2);
        assert_eq!(form.files[0].field_name, "doc");
        assert_eq!(form.files[0].original_name.as_deref(), Some("notes.pdf"));
        assert_eq!(form.files[0].mimetype.as_deref(), Some("application/octet-stream"));
        assert_eq!(form.files[0].content_type, "application/pdf");
        assert_eq!(form.files[0].size, 13);
        assert_eq!(form.files[1].content_type, "application/octet-stream");
        assert_eq!(client.object_count(), 2);
    }

    #[tokio::test]
    async fn failed_file_removes_earlier_files() {
        let client = MemoryClient::new().fail_initiate().failing_only_key("second");
        let engine = Engine::new(
            EngineOptions::new()
                .client(Arc::new(client.clone()))
                .bucket("test")
                .key(crate::options::Resolver::from_fn(|info: &FileInfo| {
                    Ok(info.field_name.clone())
                })),
        )
        .unwrap();
        let body = multipart_body(&[
            ("first", Some("a.txt"), &b"aaa"[..]),
            ("second", Some("b.txt"), &b"bbb"[..]),
        ]);

        let err = store_multipart(&engine, multipart(body).await).await.unwrap_err();

        assert!(matches!(err, FormError::File { .. }));
        assert!(err.cleanup_failures().is_empty());
        assert_eq!(err.http_status_code(), 502);
        assert_eq!(client.object_count(), 0);
    }
}
