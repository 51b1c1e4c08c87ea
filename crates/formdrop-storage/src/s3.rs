use crate::traits::{
    CompletedUpload, ObjectClient, StorageError, StorageResult, UploadHandle, UploadRequest,
    UploadTicket,
};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::abort_multipart_upload::AbortMultipartUploadError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    CompletedMultipartUpload, CompletedPart, ObjectCannedAcl, ServerSideEncryption, StorageClass,
};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use formdrop_core::constants::{DEFAULT_PART_SIZE, MIN_PART_SIZE};
use std::time::Instant;

/// S3 object client
///
/// Uploads go through S3 multipart uploads. Chunks are accumulated into parts of
/// `part_size` bytes and each part is sent as soon as it fills, one at a time.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    part_size: usize,
}

impl S3Client {
    /// Create a new S3Client instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO, "https://nyc3.digitaloceanspaces.com" for DigitalOcean Spaces)
    pub async fn new(region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = endpoint_url {
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config);
            if let Some(provider) = config.credentials_provider() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            // Path-style addressing is required for MinIO and most S3-compatible providers
            s3_config_builder = s3_config_builder.force_path_style(true);

            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        Ok(Self::from_client(client, region, endpoint_url))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client, region: String, endpoint_url: Option<String>) -> Self {
        S3Client {
            client,
            region,
            endpoint_url,
            part_size: DEFAULT_PART_SIZE,
        }
    }

    pub fn with_part_size(mut self, part_size: usize) -> StorageResult<Self> {
        if part_size < MIN_PART_SIZE {
            return Err(StorageError::ConfigError(format!(
                "part size {} is below the S3 minimum of {} bytes",
                part_size, MIN_PART_SIZE
            )));
        }
        self.part_size = part_size;
        Ok(self)
    }

    /// Generate public URL for S3 object
    ///
    /// Only used when the complete response carries no location.
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            // Path-style: {endpoint}/{bucket}/{key}
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
        } else {
            format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key)
        }
    }
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn create_upload(&self, request: &UploadRequest) -> StorageResult<Box<dyn UploadHandle>> {
        let metadata = if request.metadata.is_empty() {
            None
        } else {
            Some(request.metadata.clone().into_iter().collect())
        };

        let output = self
            .client
            .create_multipart_upload()
            .bucket(&request.bucket)
            .key(&request.key)
            .content_type(&request.content_type)
            .set_acl(request.acl.as_deref().map(ObjectCannedAcl::from))
            .set_server_side_encryption(
                request
                    .server_side_encryption
                    .as_deref()
                    .map(ServerSideEncryption::from),
            )
            .set_ssekms_key_id(request.sse_kms_key_id.clone())
            .set_storage_class(request.storage_class.as_deref().map(StorageClass::from))
            .set_cache_control(request.cache_control.clone())
            .set_content_disposition(request.content_disposition.clone())
            .set_content_encoding(request.content_encoding.clone())
            .set_metadata(metadata)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %request.bucket,
                    key = %request.key,
                    "Failed to create multipart upload"
                );
                StorageError::InitiateFailed(e.to_string())
            })?;

        let upload_id = output.upload_id().ok_or_else(|| {
            StorageError::InitiateFailed("No upload ID returned from S3".to_string())
        })?;

        tracing::debug!(
            bucket = %request.bucket,
            key = %request.key,
            upload_id = %upload_id,
            "S3 multipart upload created"
        );

        Ok(Box::new(S3UploadHandle {
            client: self.client.clone(),
            ticket: UploadTicket {
                bucket: request.bucket.clone(),
                key: request.key.clone(),
                upload_id: upload_id.to_string(),
            },
            pending: PartBuffer::new(self.part_size),
            parts: Vec::new(),
            fallback_location: self.generate_url(&request.bucket, &request.key),
            bytes_sent: 0,
            closed: false,
            start: Instant::now(),
        }))
    }

    async fn abort_upload(&self, ticket: &UploadTicket) -> StorageResult<()> {
        abort_multipart(&self.client, ticket).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let start = Instant::now();

        // S3 deletes are idempotent; check with HEAD first so a second removal is reported.
        if let Err(e) = self.client.head_object().bucket(bucket).key(key).send().await {
            return Err(match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => StorageError::NotFound(key.to_string()),
                    _ => StorageError::DeleteFailed(e.to_string()),
                },
                _ => StorageError::DeleteFailed(e.to_string()),
            });
        }

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

async fn abort_multipart(client: &Client, ticket: &UploadTicket) -> StorageResult<()> {
    client
        .abort_multipart_upload()
        .bucket(&ticket.bucket)
        .key(&ticket.key)
        .upload_id(&ticket.upload_id)
        .send()
        .await
        .map_err(|e| match &e {
            SdkError::ServiceError(service_err)
                if matches!(service_err.err(), AbortMultipartUploadError::NoSuchUpload(_)) =>
            {
                StorageError::NotFound(ticket.upload_id.clone())
            }
            _ => StorageError::AbortFailed(e.to_string()),
        })?;

    tracing::info!(
        bucket = %ticket.bucket,
        key = %ticket.key,
        upload_id = %ticket.upload_id,
        "S3 multipart upload aborted"
    );

    Ok(())
}

/// Slices incoming chunks into numbered parts.
///
/// Every part but the last is exactly `part_size` bytes. At most one part plus the
/// latest chunk is held at any time.
#[derive(Debug)]
struct PartBuffer {
    part_size: usize,
    buffer: BytesMut,
    next_part_number: i32,
}

impl PartBuffer {
    fn new(part_size: usize) -> Self {
        Self {
            part_size,
            buffer: BytesMut::new(),
            next_part_number: 1,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// The next full part, if one is buffered.
    fn take_full(&mut self) -> Option<(i32, Bytes)> {
        if self.buffer.len() < self.part_size {
            return None;
        }
        let part = self.buffer.split_to(self.part_size).freeze();
        Some((self.advance(), part))
    }

    /// Whatever remains as the final part. An upload that produced no part yet gets
    /// a single empty one, since S3 cannot complete without parts.
    fn take_rest(&mut self) -> Option<(i32, Bytes)> {
        if self.buffer.is_empty() && self.next_part_number > 1 {
            return None;
        }
        let rest = self.buffer.split().freeze();
        Some((self.advance(), rest))
    }

    fn advance(&mut self) -> i32 {
        let number = self.next_part_number;
        self.next_part_number += 1;
        number
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

struct S3UploadHandle {
    client: Client,
    ticket: UploadTicket,
    pending: PartBuffer,
    parts: Vec<CompletedPart>,
    fallback_location: String,
    bytes_sent: u64,
    closed: bool,
    start: Instant,
}

impl S3UploadHandle {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::UploadClosed(self.ticket.upload_id.clone()));
        }
        Ok(())
    }

    async fn upload_part(&mut self, part_number: i32, body: Bytes) -> StorageResult<()> {
        let size = body.len() as u64;

        let output = self
            .client
            .upload_part()
            .bucket(&self.ticket.bucket)
            .key(&self.ticket.key)
            .upload_id(&self.ticket.upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.ticket.bucket,
                    key = %self.ticket.key,
                    part_number = part_number,
                    "Failed to upload part"
                );
                StorageError::PartFailed {
                    part_number,
                    message: e.to_string(),
                }
            })?;

        let etag = output
            .e_tag()
            .ok_or_else(|| StorageError::PartFailed {
                part_number,
                message: "No ETag returned".to_string(),
            })?
            .to_string();

        self.parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .e_tag(etag)
                .build(),
        );
        self.bytes_sent += size;

        tracing::debug!(
            key = %self.ticket.key,
            part_number = part_number,
            size_bytes = size,
            "S3 part uploaded"
        );

        Ok(())
    }
}

#[async_trait]
impl UploadHandle for S3UploadHandle {
    fn ticket(&self) -> &UploadTicket {
        &self.ticket
    }

    async fn write(&mut self, chunk: Bytes) -> StorageResult<()> {
        self.ensure_open()?;
        self.pending.push(&chunk);

        while let Some((part_number, part)) = self.pending.take_full() {
            self.upload_part(part_number, part).await?;
        }

        Ok(())
    }

    async fn complete(&mut self) -> StorageResult<CompletedUpload> {
        self.ensure_open()?;

        if let Some((part_number, rest)) = self.pending.take_rest() {
            self.upload_part(part_number, rest).await?;
        }

        let completed_parts = CompletedMultipartUpload::builder()
            .set_parts(Some(self.parts.clone()))
            .build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.ticket.bucket)
            .key(&self.ticket.key)
            .upload_id(&self.ticket.upload_id)
            .multipart_upload(completed_parts)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.ticket.bucket,
                    key = %self.ticket.key,
                    "Failed to complete multipart upload"
                );
                StorageError::CompleteFailed(e.to_string())
            })?;

        self.closed = true;

        tracing::info!(
            bucket = %self.ticket.bucket,
            key = %self.ticket.key,
            size_bytes = self.bytes_sent,
            parts = self.parts.len(),
            duration_ms = self.start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload successful"
        );

        Ok(CompletedUpload {
            etag: output.e_tag().map(str::to_string),
            location: output
                .location()
                .map(str::to_string)
                .unwrap_or_else(|| self.fallback_location.clone()),
            version_id: output.version_id().map(str::to_string),
        })
    }

    async fn abort(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.pending.clear();
        abort_multipart(&self.client, &self.ticket).await?;
        self.closed = true;
        Ok(())
    }
}
